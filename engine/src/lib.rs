//! Specdeck Engine - project tree and task progress synchronization.
//!
//! This crate is the core of the Specdeck workbench: it presents a large,
//! possibly deep project directory as a tree, annotates change folders
//! with completion metrics parsed from `tasks.md` checklists, and keeps
//! both coherent with an externally mutated filesystem — without
//! re-scanning the whole project on every change and without blocking the
//! interface while scanning.
//!
//! # Overview
//!
//! Each open tab owns an isolated [`session::Session`]: three category
//! trees (`changes`, `specs`, other files), a progress cache, a watch
//! subscription, and a load token. Loads are two-phase (shallow first
//! paint, delayed unbounded background pass); staleness is handled by
//! generation tokens instead of cancellation. The
//! [`tabs::TabManager`] bounds how many sessions exist at once.
//!
//! # Modules
//!
//! - [`types`]: tree node, file content, and change event types
//! - [`parser`]: checklist markdown → structured task list
//! - [`provider`]: the async filesystem provider boundary
//! - [`local_fs`]: production provider backed by the local disk
//! - [`progress`]: progress cache and checklist worker pool
//! - [`loader`]: category tree loading and lazy folder expansion
//! - [`session`]: per-tab state and load orchestration
//! - [`coordinator`]: change-event debouncing and invalidation
//! - [`tabs`]: bounded tab registry
//! - [`config`]: environment-driven tuning constants
//! - [`error`]: error taxonomy
//! - [`util`]: debouncing and path helpers

pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod local_fs;
pub mod parser;
pub mod progress;
pub mod provider;
pub mod session;
pub mod tabs;
pub mod types;
pub mod util;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, ProviderError, Result};
pub use local_fs::LocalFs;
pub use parser::{parse_task_list, task_progress, TaskItem};
pub use progress::ProgressCache;
pub use provider::FileSystemProvider;
pub use session::{Session, SessionSnapshot};
pub use tabs::{TabInfo, TabManager};
pub use types::{
    ChangeEvent, ChangeKind, DisplayKind, FileContent, FileKind, NodeKind, Progress, TreeNode,
    CHECKLIST_FILE,
};
