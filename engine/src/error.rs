//! Error types for the Specdeck engine.
//!
//! Two layers of errors exist by design. [`ProviderError`] covers single
//! filesystem operations and is recovered locally (a failed directory read
//! becomes an empty subtree, a failed checklist read leaves progress
//! absent). [`EngineError`] covers the failures that are allowed to reach
//! the interface layer: load orchestration failures, tab capacity, and
//! configuration problems.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by a [`FileSystemProvider`](crate::provider::FileSystemProvider)
/// operation.
///
/// Providers report failures by value, never by panicking. Callers inside
/// the engine swallow these at the point of use and substitute empty
/// results; they abort nothing.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The requested path does not exist.
    #[error("path not found: {0}")]
    NotFound(String),

    /// An I/O failure while reading or writing a path.
    #[error("I/O error at {path}: {message}")]
    Io {
        /// The path the operation was issued against.
        path: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The watch subscription could not be established or torn down.
    #[error("watch error: {0}")]
    Watch(String),
}

impl ProviderError {
    /// Wraps a [`std::io::Error`] with the path it occurred at.
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Errors that can surface to the interface layer.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A provider failure that escaped local recovery (watch subscription,
    /// explicit file save).
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Unexpected failure during load orchestration. Surfaced as the
    /// session's human-readable `error` string; the tree keeps its
    /// last-known-good state.
    #[error("session error: {0}")]
    Session(String),

    /// The tab limit was reached. Reported synchronously; no tab state is
    /// mutated.
    #[error("tab limit reached ({max} tabs)")]
    TabCapacity {
        /// The configured maximum number of tabs.
        max: usize,
    },

    /// No tab exists with the given identifier.
    #[error("no such tab: {0}")]
    NoSuchTab(u64),
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
