//! Per-tab project session.
//!
//! A session owns everything one open project needs: the three category
//! trees, the progress cache, the watch binding, and the load token that
//! keeps all of them coherent.
//!
//! # Load tokens
//!
//! Every `load_project` mints a new token. Asynchronous continuations
//! (the delayed full reload, batched worker results, expansion reads)
//! capture the token at start and compare it against the session's
//! current token before mutating shared state; on mismatch they discard
//! their results silently. Provider calls themselves are never cancelled
//! — a stale call completes, costs its I/O, and is ignored.
//!
//! # Two-phase loading
//!
//! `load_project` reads a shallow tree first for fast first paint, then
//! unconditionally schedules an unbounded reload after a short delay so
//! deep structures materialize without blocking the initial render. The
//! full reload shares its originating load's token: a newer load bumps
//! the token and the pending timer's results evaporate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::coordinator::ChangeCoordinator;
use crate::error::Result;
use crate::loader::{self, BaseResolution};
use crate::parser;
use crate::progress::{self, ProgressCache};
use crate::provider::FileSystemProvider;
use crate::types::{FileContent, Progress, TreeNode};
use crate::util::paths;

/// Fallback project name when the path yields no usable last segment.
const FALLBACK_PROJECT_NAME: &str = "Project";

/// Mutable per-session state, guarded by one async lock and mutated only
/// at well-defined resumption points.
#[derive(Debug, Default)]
struct SessionState {
    project_path: String,
    project_name: String,
    /// Resolved OpenSpec base, cached for the project path it was probed
    /// for so watch-triggered reloads skip the probe.
    base: Option<BaseResolution>,
    base_for: String,
    changes: Vec<TreeNode>,
    specs: Vec<TreeNode>,
    other: Vec<TreeNode>,
    current_file: Option<FileContent>,
    other_files_visible: bool,
    is_loading: bool,
    is_background_loading: bool,
    error: Option<String>,
}

struct SessionInner {
    key: String,
    provider: Arc<dyn FileSystemProvider>,
    config: EngineConfig,
    state: RwLock<SessionState>,
    token: AtomicU64,
    cache: ProgressCache,
    coordinator: ChangeCoordinator,
    /// Pending two-phase reload timer, replaced or aborted as loads come
    /// and go.
    full_reload: StdMutex<Option<JoinHandle<()>>>,
}

/// One open project's isolated tree/cache/watch state.
///
/// Cheap to clone; clones share the same underlying session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Immutable view of a session handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub project_path: String,
    pub project_name: String,
    pub changes: Vec<TreeNode>,
    pub specs: Vec<TreeNode>,
    pub other: Vec<TreeNode>,
    pub current_file: Option<FileContent>,
    pub is_loading: bool,
    pub is_background_loading: bool,
    pub error: Option<String>,
}

impl Session {
    /// Creates an empty session addressed by `key` (the watch subscription
    /// identifier).
    pub fn new(key: impl Into<String>, provider: Arc<dyn FileSystemProvider>, config: EngineConfig) -> Self {
        let key = key.into();
        Self {
            inner: Arc::new(SessionInner {
                coordinator: ChangeCoordinator::new(key.clone()),
                key,
                provider,
                config,
                state: RwLock::new(SessionState::default()),
                token: AtomicU64::new(0),
                cache: ProgressCache::new(),
                full_reload: StdMutex::new(None),
            }),
        }
    }

    /// The session's subscription key.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The filesystem provider this session reads through.
    pub(crate) fn provider(&self) -> &dyn FileSystemProvider {
        self.inner.provider.as_ref()
    }

    /// Engine tuning constants.
    pub(crate) fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The progress cache owned by this session.
    pub(crate) fn cache(&self) -> &ProgressCache {
        &self.inner.cache
    }

    /// The currently valid load token.
    pub(crate) fn current_token(&self) -> u64 {
        self.inner.token.load(Ordering::SeqCst)
    }

    /// Mints the next load token, invalidating all in-flight work.
    fn mint_token(&self) -> u64 {
        self.inner.token.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The open project's path, empty when no project is open.
    pub(crate) async fn project_path(&self) -> String {
        self.inner.state.read().await.project_path.clone()
    }

    /// Whether a project is open in this session.
    pub async fn has_project(&self) -> bool {
        !self.inner.state.read().await.project_path.is_empty()
    }

    /// The loaded project's display name.
    pub async fn project_name(&self) -> String {
        self.inner.state.read().await.project_name.clone()
    }

    /// Points the session at a project directory and loads it.
    pub async fn open_project(&self, path: &str) {
        let normalized = paths::normalize(path);
        let name = paths::file_name(&normalized).to_string();
        info!(key = %self.inner.key, path = %normalized, "Opening project");
        {
            let mut state = self.inner.state.write().await;
            state.project_path = normalized;
            state.project_name = if name.is_empty() {
                FALLBACK_PROJECT_NAME.to_string()
            } else {
                name
            };
            state.base = None;
            state.base_for.clear();
            state.current_file = None;
            state.error = None;
        }
        self.load_project().await;
    }

    /// Loads (or reloads) the open project.
    ///
    /// Performs the shallow pass inline, establishes the watch, and
    /// schedules the unbounded background pass. Failures never blank the
    /// tree: a failed category read yields an empty tree for that
    /// category only, and orchestration failures land in the session's
    /// `error` string with the last-known-good tree intact.
    pub async fn load_project(&self) {
        let (project_path, include_other) = {
            let state = self.inner.state.read().await;
            if state.project_path.is_empty() {
                return;
            }
            (state.project_path.clone(), state.other_files_visible)
        };

        let token = self.mint_token();
        self.cancel_full_reload();
        {
            let mut state = self.inner.state.write().await;
            state.is_loading = true;
            state.is_background_loading = false;
            state.error = None;
        }

        let base = self.resolve_base_cached(&project_path).await;
        self.load_pass(&project_path, base, token, Some(self.inner.config.initial_depth), include_other)
            .await;

        // The full reload is scheduled unconditionally; a fast first paint
        // must always be followed by the unbounded pass.
        self.schedule_full_reload(project_path.clone(), base, token, include_other);

        let watch_result = self.inner.coordinator.ensure_watching(self, &project_path).await;

        let mut state = self.inner.state.write().await;
        if self.current_token() == token {
            state.is_loading = false;
            if let Err(e) = watch_result {
                warn!(key = %self.inner.key, error = %e, "Watch subscription failed");
                state.error = Some(e.to_string());
            }
        }
    }

    /// Resolves the OpenSpec base, probing only when the cached value was
    /// computed for a different project path.
    async fn resolve_base_cached(&self, project_path: &str) -> BaseResolution {
        {
            let state = self.inner.state.read().await;
            if state.base_for == project_path {
                if let Some(base) = state.base {
                    return base;
                }
            }
        }
        let base = loader::resolve_base(self.provider(), project_path).await;
        let mut state = self.inner.state.write().await;
        state.base = Some(base);
        state.base_for = project_path.to_string();
        base
    }

    /// One load pass at the given depth: read trees, apply under the
    /// token guard, kick off progress backfill for uncached change
    /// folders.
    async fn load_pass(
        &self,
        project_path: &str,
        base: BaseResolution,
        token: u64,
        depth: Option<usize>,
        include_other: bool,
    ) {
        let trees = loader::load_trees(self.provider(), project_path, base, depth, include_other).await;

        let candidates = {
            let mut state = self.inner.state.write().await;
            if self.current_token() != token {
                trace!(key = %self.inner.key, token, "Discarding superseded load results");
                return;
            }
            state.changes = trees.changes;
            state.specs = trees.specs;
            state.other = trees.other;

            let mut candidates = Vec::new();
            for node in state.changes.iter_mut().filter(|node| node.is_folder()) {
                match self.inner.cache.get(&node.path) {
                    Some(progress) => node.progress = Some(progress),
                    None => candidates.push(node.path.clone()),
                }
            }
            candidates
        };

        if !candidates.is_empty() {
            progress::spawn_backfill(self.clone(), token, candidates);
        }
    }

    /// Schedules the unbounded background reload for the current load
    /// generation.
    fn schedule_full_reload(
        &self,
        project_path: String,
        base: BaseResolution,
        token: u64,
        include_other: bool,
    ) {
        // A superseded load must not replace (and thereby cancel) the
        // newer generation's pending timer.
        if self.current_token() != token {
            return;
        }
        let session = self.clone();
        let delay = self.inner.config.full_load_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if session.current_token() != token {
                return;
            }
            {
                let mut state = session.inner.state.write().await;
                state.is_background_loading = true;
            }
            debug!(key = %session.inner.key, "Starting full background load");
            session
                .load_pass(&project_path, base, token, None, include_other)
                .await;
            let mut state = session.inner.state.write().await;
            if session.current_token() == token {
                state.is_background_loading = false;
            }
        });

        let mut slot = self.inner.full_reload.lock().expect("full reload slot");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Cancels a pending background reload timer, if any.
    fn cancel_full_reload(&self) {
        let mut slot = self.inner.full_reload.lock().expect("full reload slot");
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    /// Applies a batch of worker-computed progress results in one state
    /// mutation. Stale batches release their pending markers and change
    /// nothing else.
    pub(crate) async fn apply_progress_batch(&self, token: u64, results: &[(String, Progress)]) {
        let mut state = self.inner.state.write().await;
        if self.current_token() != token {
            for (key, _) in results {
                self.inner.cache.abandon(key);
            }
            return;
        }
        for (key, progress) in results {
            if self.inner.cache.complete(key, *progress) {
                if let Some(node) = state.changes.iter_mut().find(|node| node.path == *key) {
                    node.progress = Some(*progress);
                }
            }
        }
    }

    /// Opens a file into `current_file`.
    ///
    /// Opening a checklist also refreshes the owning change folder's
    /// progress from the same text, keeping badge and rendered checklist
    /// in lockstep.
    pub async fn load_file(&self, path: &str) {
        let project_path = self.project_path().await;
        if project_path.is_empty() {
            return;
        }
        let token = self.current_token();
        let rel = paths::normalize(path);
        let full = paths::join(&project_path, &rel);

        {
            let mut state = self.inner.state.write().await;
            state.is_loading = true;
            state.error = None;
        }

        let read = self.provider().read_file(&full).await;

        let mut state = self.inner.state.write().await;
        state.is_loading = false;
        if self.current_token() != token {
            return;
        }
        match read {
            Ok(content) => {
                if paths::is_checklist(&rel) {
                    if let Some(parent_path) = paths::parent(&rel) {
                        let progress = parser::task_progress(&content);
                        self.inner.cache.put(parent_path, progress);
                        if let Some(node) =
                            state.changes.iter_mut().find(|node| node.path == parent_path)
                        {
                            node.progress = Some(progress);
                        }
                    }
                }
                state.current_file = Some(FileContent::classify(rel, content));
            }
            Err(e) => {
                state.error = Some(e.to_string());
            }
        }
    }

    /// Writes a file through the provider.
    pub async fn save_file(&self, path: &str, content: &str) -> Result<()> {
        let project_path = self.project_path().await;
        let rel = paths::normalize(path);
        let full = paths::join(&project_path, &rel);
        self.provider().write_file(&full, content).await?;
        Ok(())
    }

    /// Expands a single lazily loaded folder in place.
    ///
    /// Reads only that directory and rewrites the children under the
    /// node's own path; sibling and ancestor identity is untouched.
    pub async fn expand_folder(&self, path: &str) {
        let project_path = self.project_path().await;
        if project_path.is_empty() {
            return;
        }
        let token = self.current_token();
        let rel = paths::normalize(path);
        let children = loader::expand_dir(self.provider(), &project_path, &rel).await;

        let mut guard = self.inner.state.write().await;
        if self.current_token() != token {
            return;
        }
        let state = &mut *guard;
        let node = find_node_mut(&mut state.changes, &rel)
            .or_else(|| find_node_mut(&mut state.specs, &rel))
            .or_else(|| find_node_mut(&mut state.other, &rel));
        if let Some(node) = node {
            if node.is_folder() {
                node.children = children;
                node.children_loaded = true;
            }
        }
    }

    /// Shows or hides the other-files panel. Turning it on triggers a
    /// reload so the panel has data to show.
    pub async fn set_other_files_visible(&self, visible: bool) {
        let (had_project, was_visible) = {
            let mut state = self.inner.state.write().await;
            let was = state.other_files_visible;
            state.other_files_visible = visible;
            if !visible {
                state.other.clear();
            }
            (!state.project_path.is_empty(), was)
        };
        if visible && !was_visible && had_project {
            self.load_project().await;
        }
    }

    /// Path of the currently open file, if any.
    pub(crate) async fn current_file_path(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .current_file
            .as_ref()
            .map(|file| file.path.clone())
    }

    /// Drops the open file (it was deleted externally).
    pub(crate) async fn clear_current_file(&self) {
        let mut state = self.inner.state.write().await;
        state.current_file = None;
    }

    /// Removes the cache entry for one change folder, used by the change
    /// coordinator for targeted invalidation.
    pub(crate) fn invalidate_progress(&self, folder_path: &str) {
        self.inner.cache.invalidate(folder_path);
    }

    /// Tears the session down: invalidates all in-flight work, cancels
    /// timers, unsubscribes the watch, clears caches, and blanks state.
    pub async fn reset(&self) {
        info!(key = %self.inner.key, "Resetting session");
        self.mint_token();
        self.cancel_full_reload();
        self.inner.coordinator.teardown(self.provider()).await;
        self.inner.cache.clear();
        let mut state = self.inner.state.write().await;
        *state = SessionState::default();
    }

    /// Clones the current state for the rendering layer.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.read().await;
        SessionSnapshot {
            project_path: state.project_path.clone(),
            project_name: state.project_name.clone(),
            changes: state.changes.clone(),
            specs: state.specs.clone(),
            other: state.other.clone(),
            current_file: state.current_file.clone(),
            is_loading: state.is_loading,
            is_background_loading: state.is_background_loading,
            error: state.error.clone(),
        }
    }
}

/// Finds a node by path, descending only into subtrees whose path
/// prefixes the target.
fn find_node_mut<'a>(nodes: &'a mut [TreeNode], path: &str) -> Option<&'a mut TreeNode> {
    for node in nodes.iter_mut() {
        if node.path == path {
            return Some(node);
        }
        let is_ancestor = path.starts_with(node.path.as_str())
            && path.as_bytes().get(node.path.len()) == Some(&b'/');
        if is_ancestor {
            return find_node_mut(&mut node.children, path);
        }
    }
    None
}
