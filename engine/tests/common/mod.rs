//! Shared test support: a scripted in-memory filesystem provider.
//!
//! `MockFs` derives directory listings from a flat map of file paths, so
//! tests declare project layouts as plain `(path, content)` pairs. Every
//! operation can be delayed through a per-path delay queue (virtual time
//! under `start_paused` runtimes), which is how the out-of-order
//! resolution scenarios are scripted. Call counters expose how often each
//! path was listed or read.

// Not every test file exercises every helper.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use specdeck_engine::error::ProviderError;
use specdeck_engine::provider::{FileSystemProvider, ProviderResult};
use specdeck_engine::types::{ChangeEvent, ChangeKind, TreeNode};

/// Scripted in-memory filesystem.
#[derive(Default)]
pub struct MockFs {
    files: Mutex<BTreeMap<String, String>>,
    /// Per-path queues of artificial latencies, popped one per call.
    delays: Mutex<HashMap<String, Vec<Duration>>>,
    list_calls: Mutex<Vec<String>>,
    read_calls: Mutex<Vec<String>>,
    watch_calls: Mutex<Vec<(String, String)>>,
    unwatch_calls: Mutex<Vec<String>>,
    watchers: Mutex<HashMap<String, mpsc::Sender<ChangeEvent>>>,
}

impl MockFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds (or replaces) a file at an absolute, forward-slash path.
    pub fn add_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove_file(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    /// Queues an artificial latency for the next operation against `path`.
    pub fn push_delay(&self, path: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push(delay);
    }

    pub fn list_count(&self, path: &str) -> usize {
        self.list_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn read_count(&self, path: &str) -> usize {
        self.read_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn watch_count(&self) -> usize {
        self.watch_calls.lock().unwrap().len()
    }

    pub fn unwatch_count(&self) -> usize {
        self.unwatch_calls.lock().unwrap().len()
    }

    pub fn has_watcher(&self, key: &str) -> bool {
        self.watchers.lock().unwrap().contains_key(key)
    }

    /// Delivers a change event to the watcher registered under `key`.
    pub async fn emit(&self, key: &str, kind: ChangeKind, path: &str) {
        let event = ChangeEvent {
            key: key.to_string(),
            kind,
            path: path.to_string(),
        };
        self.emit_raw(key, event).await;
    }

    /// Delivers an arbitrary event through the watcher registered under
    /// `watcher_key`; the event may carry a different (foreign) key.
    pub async fn emit_raw(&self, watcher_key: &str, event: ChangeEvent) {
        let sender = self.watchers.lock().unwrap().get(watcher_key).cloned();
        if let Some(sender) = sender {
            sender.send(event).await.expect("watch channel open");
        }
    }

    fn take_delay(&self, path: &str) -> Option<Duration> {
        let mut delays = self.delays.lock().unwrap();
        let queue = delays.get_mut(path)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    async fn apply_delay(&self, path: &str) {
        if let Some(delay) = self.take_delay(path) {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Snapshot of the file paths under `dir`, relative to it.
    fn relative_files(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl FileSystemProvider for MockFs {
    async fn list_directory(
        &self,
        path: &str,
        max_depth: Option<usize>,
    ) -> ProviderResult<Vec<TreeNode>> {
        self.list_calls.lock().unwrap().push(path.to_string());

        // The listing is computed up front: a delayed call resolves with
        // the filesystem as it was when the call started, which is what a
        // slow real provider does.
        let files = self.relative_files(path);
        let result = if files.is_empty() {
            Err(ProviderError::NotFound(path.to_string()))
        } else {
            Ok(build_nodes(&files, "", max_depth, 0))
        };

        self.apply_delay(path).await;
        result
    }

    async fn read_file(&self, path: &str) -> ProviderResult<String> {
        self.read_calls.lock().unwrap().push(path.to_string());
        let content = self.files.lock().unwrap().get(path).cloned();
        self.apply_delay(path).await;
        content.ok_or_else(|| ProviderError::NotFound(path.to_string()))
    }

    async fn write_file(&self, path: &str, content: &str) -> ProviderResult<()> {
        self.add_file(path, content);
        Ok(())
    }

    async fn watch(
        &self,
        key: &str,
        root: &str,
        events: mpsc::Sender<ChangeEvent>,
    ) -> ProviderResult<()> {
        self.watch_calls
            .lock()
            .unwrap()
            .push((key.to_string(), root.to_string()));
        self.watchers
            .lock()
            .unwrap()
            .insert(key.to_string(), events);
        Ok(())
    }

    async fn unwatch(&self, key: &str) -> ProviderResult<()> {
        self.unwatch_calls.lock().unwrap().push(key.to_string());
        self.watchers.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Finds a node by logical path anywhere in a tree.
pub fn find_node<'a>(nodes: &'a [TreeNode], path: &str) -> Option<&'a TreeNode> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, path) {
            return Some(found);
        }
    }
    None
}

/// Builds a depth-bounded node tree from relative file paths.
fn build_nodes(
    files: &[String],
    base: &str,
    max_depth: Option<usize>,
    depth: usize,
) -> Vec<TreeNode> {
    // First segment -> deeper remainders (empty vec marks a plain file).
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in files {
        match file.split_once('/') {
            Some((head, rest)) => groups
                .entry(head.to_string())
                .or_default()
                .push(rest.to_string()),
            None => {
                groups.entry(file.clone()).or_default();
            }
        }
    }

    let mut folders = Vec::new();
    let mut plain = Vec::new();
    for (name, rest) in groups {
        let rel = if base.is_empty() {
            name.clone()
        } else {
            format!("{base}/{name}")
        };
        if rest.is_empty() {
            plain.push(TreeNode::file(rel));
        } else {
            let next_depth = depth + 1;
            let can_descend = max_depth.is_none_or(|bound| next_depth <= bound);
            let mut node = TreeNode::folder(rel.clone());
            if can_descend {
                node.children = build_nodes(&rest, &rel, max_depth, next_depth);
            }
            node.children_loaded = can_descend;
            folders.push(node);
        }
    }

    folders.extend(plain);
    folders
}
