//! Production filesystem provider backed by the local disk.
//!
//! Directory listings run on the blocking thread pool; file reads and
//! writes go through `tokio::fs`. Watching uses the [`notify`] crate with
//! a deliberately lightweight callback: events are filtered and forwarded
//! into a tokio channel, and all downstream work happens in async tasks.
//!
//! # Listing semantics
//!
//! Entries are sorted folders-first, then case-insensitively by name.
//! `node_modules` and `.git` directories are skipped. A `max_depth` of
//! `Some(0)` lists immediate children only; folders beyond the bound are
//! returned with `children_loaded = false`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::ProviderError;
use crate::provider::{FileSystemProvider, ProviderResult};
use crate::types::{ChangeEvent, ChangeKind, TreeNode};
use crate::util::paths;

use async_trait::async_trait;

/// Directory names never descended into or reported.
const SKIPPED_DIRS: [&str; 2] = ["node_modules", ".git"];

/// Local-disk implementation of [`FileSystemProvider`].
#[derive(Default)]
pub struct LocalFs {
    /// Active watch subscriptions by key. The watcher handle must stay
    /// alive for events to keep flowing; dropping it unsubscribes.
    watchers: Mutex<HashMap<String, RecommendedWatcher>>,
}

impl LocalFs {
    /// Creates a provider with no active watches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileSystemProvider for LocalFs {
    async fn list_directory(
        &self,
        path: &str,
        max_depth: Option<usize>,
    ) -> ProviderResult<Vec<TreeNode>> {
        let root = PathBuf::from(path);
        let display_path = path.to_string();

        let items = tokio::task::spawn_blocking(move || {
            if !root.is_dir() {
                return Err(ProviderError::NotFound(root.display().to_string()));
            }
            read_tree(&root, "", max_depth, 0)
        })
        .await
        .map_err(|e| ProviderError::Io {
            path: display_path.clone(),
            message: e.to_string(),
        })??;

        trace!(path = %display_path, count = items.len(), "Listed directory");
        Ok(items)
    }

    async fn read_file(&self, path: &str) -> ProviderResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProviderError::NotFound(path.to_string()),
                _ => ProviderError::io(path, e),
            })
    }

    async fn write_file(&self, path: &str, content: &str) -> ProviderResult<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ProviderError::io(path, e))
    }

    async fn watch(
        &self,
        key: &str,
        root: &str,
        events: mpsc::Sender<ChangeEvent>,
    ) -> ProviderResult<()> {
        let root_path = PathBuf::from(root);
        if !root_path.is_dir() {
            return Err(ProviderError::NotFound(root.to_string()));
        }

        let event_key = key.to_string();
        let filter_root = root_path.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => forward_event(&event_key, &filter_root, &event, &events),
                Err(e) => warn!(error = %e, "Watch error"),
            },
        )
        .map_err(|e| ProviderError::Watch(e.to_string()))?;

        watcher
            .watch(&root_path, RecursiveMode::Recursive)
            .map_err(|e| ProviderError::Watch(e.to_string()))?;

        debug!(key = %key, root = %root, "Started recursive watch");

        // Replacing an existing subscription for the key drops the old
        // watcher, which unsubscribes it.
        let mut watchers = self.watchers.lock().expect("watcher registry poisoned");
        watchers.insert(key.to_string(), watcher);

        Ok(())
    }

    async fn unwatch(&self, key: &str) -> ProviderResult<()> {
        let mut watchers = self.watchers.lock().expect("watcher registry poisoned");
        if watchers.remove(key).is_some() {
            debug!(key = %key, "Stopped watch");
        }
        Ok(())
    }
}

/// Forwards one notify event into the channel, filtering noise.
///
/// Runs on the notify callback thread: no I/O, no locks, `try_send` only.
/// Hidden and dependency directories are filtered by the path relative to
/// the watch root, so a watch rooted inside a hidden directory still
/// delivers its own events.
fn forward_event(key: &str, root: &Path, event: &Event, events: &mpsc::Sender<ChangeEvent>) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return,
    };

    for path in &event.paths {
        let rel = path.strip_prefix(root).unwrap_or(path);
        if is_ignored(rel) {
            continue;
        }
        let change = ChangeEvent {
            key: key.to_string(),
            kind,
            path: path.to_string_lossy().to_string(),
        };
        // Dropping an event under backpressure beats blocking the notify
        // thread; the debounced reload makes the tree converge anyway.
        if let Err(e) = events.try_send(change) {
            warn!(error = %e, "Dropped change event, channel full or closed");
        }
    }
}

/// Whether a changed path lies under a hidden or dependency directory.
fn is_ignored(path: &Path) -> bool {
    path.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        name == "node_modules" || (name.starts_with('.') && name.len() > 1 && name != "..")
    })
}

/// Recursively reads a directory into tree nodes with paths relative to
/// the read root.
fn read_tree(
    dir: &Path,
    base: &str,
    max_depth: Option<usize>,
    depth: usize,
) -> ProviderResult<Vec<TreeNode>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ProviderError::io(dir.display().to_string(), e)),
    };

    let mut listed: Vec<(String, bool)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && SKIPPED_DIRS.contains(&name.as_str()) {
            continue;
        }
        listed.push((name, is_dir));
    }

    // Folders first, then case-insensitive name order.
    listed.sort_by(|(a_name, a_dir), (b_name, b_dir)| {
        b_dir
            .cmp(a_dir)
            .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
            .then_with(|| a_name.cmp(b_name))
    });

    let mut items = Vec::with_capacity(listed.len());
    for (name, is_dir) in listed {
        let rel = paths::join(base, &name);
        if is_dir {
            let next_depth = depth + 1;
            let can_descend = max_depth.is_none_or(|bound| next_depth <= bound);
            let children = if can_descend {
                read_tree(&dir.join(&name), &rel, max_depth, next_depth)?
            } else {
                Vec::new()
            };
            let mut node = TreeNode::folder(rel);
            node.children = children;
            node.children_loaded = can_descend;
            items.push(node);
        } else {
            items.push(TreeNode::file(rel));
        }
    }

    Ok(items)
}
