//! The filesystem provider boundary.
//!
//! Everything the engine knows about the outside filesystem goes through
//! [`FileSystemProvider`]. The engine never touches `std::fs` directly;
//! the production implementation lives in [`local_fs`](crate::local_fs),
//! and tests substitute scripted in-memory providers to control latency
//! and failure.
//!
//! Providers report failures by returning [`ProviderError`], never by
//! panicking. Directory listings are ordered folders-first, then by name;
//! folders beyond a depth bound are returned with `children_loaded =
//! false` so callers can expand them lazily.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::types::{ChangeEvent, TreeNode};

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Asynchronous access to a slow, externally mutated filesystem.
///
/// All operations are suspend points: the calling flow yields until the
/// provider resolves. There is no cancellation — a call started under a
/// stale load token still completes and is discarded by the caller.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    /// Lists a directory as a tree of [`TreeNode`]s with paths relative to
    /// `path`.
    ///
    /// `max_depth` bounds how many folder levels are descended into:
    /// `Some(0)` lists immediate children only, `None` traverses without
    /// bound. Folders beyond the bound carry empty `children` and
    /// `children_loaded = false`.
    async fn list_directory(
        &self,
        path: &str,
        max_depth: Option<usize>,
    ) -> ProviderResult<Vec<TreeNode>>;

    /// Reads a file to a string.
    async fn read_file(&self, path: &str) -> ProviderResult<String>;

    /// Writes a file, replacing its content.
    async fn write_file(&self, path: &str, content: &str) -> ProviderResult<()>;

    /// Establishes a recursive watch on `root`, delivering change events
    /// tagged with `key` on `events` until [`unwatch`](Self::unwatch) is
    /// called for the same key.
    ///
    /// Watching a new root under an existing key replaces the previous
    /// subscription for that key.
    async fn watch(
        &self,
        key: &str,
        root: &str,
        events: mpsc::Sender<ChangeEvent>,
    ) -> ProviderResult<()>;

    /// Tears down the watch subscription for `key`. Idempotent: unknown
    /// keys are a no-op.
    async fn unwatch(&self, key: &str) -> ProviderResult<()>;
}
