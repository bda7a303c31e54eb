//! Progress cache and checklist worker pool.
//!
//! Maps normalized change-folder paths to completion counts derived from
//! their checklist files. A bounded pool of workers reads candidate
//! checklists through the provider; results are queued and applied in
//! coalesced batches so a project with hundreds of changes produces a
//! handful of state mutations, not hundreds.
//!
//! # Cache policy
//!
//! Entries are create-on-success only: a missing or unreadable checklist
//! leaves no entry (not a zero-entry), so a later successful read can
//! still populate it. A path already cached or already in flight is
//! skipped on re-submission. Invalidation removes both the entry and the
//! pending marker unconditionally; recomputation happens only when the
//! path is requested again.
//!
//! All keys are normalized to forward slashes before use; producers and
//! consumers that skip normalization would silently miss and recompute.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::session::Session;
use crate::types::{Progress, CHECKLIST_FILE};
use crate::util::paths;

/// Maximum results drained into one coalesced apply pass.
const FLUSH_CHUNK: usize = 64;

/// Path-keyed store of derived completion counts.
#[derive(Debug, Default, Clone)]
pub struct ProgressCache {
    inner: Arc<RwLock<CacheInner>>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Progress>,
    pending: HashSet<String>,
}

impl ProgressCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the cached progress for a folder path.
    pub fn get(&self, path: &str) -> Option<Progress> {
        let key = paths::normalize(path);
        self.inner.read().expect("cache lock").entries.get(&key).copied()
    }

    /// Removes the entry and any pending marker for a folder path, so the
    /// next request recomputes from the live file.
    pub fn invalidate(&self, path: &str) {
        let key = paths::normalize(path);
        let mut inner = self.inner.write().expect("cache lock");
        let removed = inner.entries.remove(&key).is_some();
        let was_pending = inner.pending.remove(&key);
        if removed || was_pending {
            debug!(path = %key, "Invalidated progress entry");
        }
    }

    /// Drops all entries and pending markers.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("cache lock");
        inner.entries.clear();
        inner.pending.clear();
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.inner.read().expect("cache lock").entries.len()
    }

    /// Whether the cache holds no completed entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claims a path for computation. Returns false when the path is
    /// already cached or already in flight.
    pub(crate) fn try_begin(&self, key: &str) -> bool {
        let mut inner = self.inner.write().expect("cache lock");
        if inner.entries.contains_key(key) || inner.pending.contains(key) {
            return false;
        }
        inner.pending.insert(key.to_string());
        true
    }

    /// Records a successful computation. The entry lands only if the path
    /// is still pending — an invalidation that raced the read wins, so the
    /// next request re-reads the live file.
    pub(crate) fn complete(&self, key: &str, progress: Progress) -> bool {
        let mut inner = self.inner.write().expect("cache lock");
        if inner.pending.remove(key) {
            inner.entries.insert(key.to_string(), progress);
            true
        } else {
            false
        }
    }

    /// Releases a pending marker without recording an entry.
    pub(crate) fn abandon(&self, key: &str) {
        let mut inner = self.inner.write().expect("cache lock");
        inner.pending.remove(key);
    }

    /// Records a freshly computed value directly, replacing any entry and
    /// pending marker. Used when the checklist text is already in hand
    /// (an explicit open of the file), bypassing the worker pipeline.
    pub(crate) fn put(&self, path: &str, progress: Progress) {
        let key = paths::normalize(path);
        let mut inner = self.inner.write().expect("cache lock");
        inner.pending.remove(&key);
        inner.entries.insert(key, progress);
    }
}

/// Spawns the backfill pipeline for a set of candidate folder paths.
///
/// Candidates already cached or pending are skipped up front. The first
/// `initial_batch_size` survivors are enqueued immediately; the remainder
/// trickle in on the batch timer so a large project does not saturate I/O
/// at once. Results are applied through
/// [`Session::apply_progress_batch`], which re-checks `token` before
/// touching shared state.
pub(crate) fn spawn_backfill(session: Session, token: u64, candidates: Vec<String>) {
    let cache = session.cache().clone();
    let accepted: Vec<String> = candidates
        .iter()
        .map(|path| paths::normalize(path))
        .filter(|key| cache.try_begin(key))
        .collect();

    if accepted.is_empty() {
        return;
    }
    trace!(count = accepted.len(), "Backfilling progress");

    let config = session.config().clone();
    let (queue_tx, queue_rx) = mpsc::channel::<String>(accepted.len().max(1));
    let (result_tx, result_rx) = mpsc::channel::<(String, Progress)>(FLUSH_CHUNK.max(1));
    let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));

    // Worker pool: bounded outstanding reads, shared queue.
    for _ in 0..config.worker_pool_size {
        let session = session.clone();
        let queue_rx = Arc::clone(&queue_rx);
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            run_worker(session, token, queue_rx, result_tx).await;
        });
    }
    drop(result_tx);

    // Feeder: immediate first batch, timed follow-up batches.
    let initial = config.initial_batch_size.min(accepted.len());
    let batch_size = config.batch_size.max(1);
    let batch_interval = config.batch_interval;
    tokio::spawn(async move {
        for key in &accepted[..initial] {
            if queue_tx.send(key.clone()).await.is_err() {
                return;
            }
        }
        for chunk in accepted[initial..].chunks(batch_size) {
            tokio::time::sleep(batch_interval).await;
            for key in chunk {
                if queue_tx.send(key.clone()).await.is_err() {
                    return;
                }
            }
        }
    });

    // Flusher: coalesce many worker results into one state mutation.
    tokio::spawn(async move {
        run_flusher(session, token, result_rx).await;
    });
}

/// One worker: pull a folder path, read its checklist, parse, report.
async fn run_worker(
    session: Session,
    token: u64,
    queue_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<String>>>,
    result_tx: mpsc::Sender<(String, Progress)>,
) {
    loop {
        let key = {
            let mut rx = queue_rx.lock().await;
            match rx.recv().await {
                Some(key) => key,
                None => return,
            }
        };

        // A superseded load's queue drains without issuing reads.
        if session.current_token() != token {
            session.cache().abandon(&key);
            continue;
        }

        let checklist = paths::join(&paths::join(&session.project_path().await, &key), CHECKLIST_FILE);
        match session.provider().read_file(&checklist).await {
            Ok(content) => {
                let progress = crate::parser::task_progress(&content);
                if result_tx.send((key, progress)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                // Missing checklists are normal; no entry is recorded.
                trace!(path = %checklist, error = %e, "No checklist progress");
                session.cache().abandon(&key);
            }
        }
    }
}

/// Drains worker results in chunks and applies each chunk in one pass.
async fn run_flusher(session: Session, token: u64, mut result_rx: mpsc::Receiver<(String, Progress)>) {
    let mut buffer = Vec::with_capacity(FLUSH_CHUNK);
    loop {
        buffer.clear();
        if result_rx.recv_many(&mut buffer, FLUSH_CHUNK).await == 0 {
            return;
        }
        session.apply_progress_batch(token, &buffer).await;
    }
}

/// Test-only handle used by unit tests to drive cache internals directly.
#[cfg(test)]
pub(crate) struct CacheProbe<'a>(pub &'a ProgressCache);

#[cfg(test)]
impl CacheProbe<'_> {
    pub fn begin(&self, key: &str) -> bool {
        self.0.try_begin(&paths::normalize(key))
    }

    pub fn complete(&self, key: &str, progress: Progress) -> bool {
        self.0.complete(&paths::normalize(key), progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(completed: usize, total: usize) -> Progress {
        Progress { completed, total }
    }

    #[test]
    fn entries_are_keyed_by_normalized_path() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        assert!(probe.begin("changes\\foo"));
        assert!(probe.complete("changes/foo", progress(1, 2)));

        assert_eq!(cache.get("changes/foo"), Some(progress(1, 2)));
        assert_eq!(cache.get("changes\\foo"), Some(progress(1, 2)));
    }

    #[test]
    fn pending_paths_are_not_claimed_twice() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        assert!(probe.begin("changes/foo"));
        assert!(!probe.begin("changes/foo"), "in-flight path must be skipped");

        probe.complete("changes/foo", progress(0, 3));
        assert!(!probe.begin("changes/foo"), "cached path must be skipped");
    }

    #[test]
    fn invalidation_removes_entry_and_pending_marker() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        probe.begin("changes/foo");
        probe.complete("changes/foo", progress(2, 2));
        probe.begin("changes/bar");

        cache.invalidate("changes/foo");
        cache.invalidate("changes/bar");

        assert_eq!(cache.get("changes/foo"), None);
        assert!(probe.begin("changes/foo"), "invalidated path is claimable");
        assert!(probe.begin("changes/bar"), "pending marker must be cleared");
    }

    #[test]
    fn invalidation_leaves_siblings_untouched() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        probe.begin("changes/foo");
        probe.complete("changes/foo", progress(1, 4));
        probe.begin("changes/bar");
        probe.complete("changes/bar", progress(4, 4));

        cache.invalidate("changes/foo");

        assert_eq!(cache.get("changes/foo"), None);
        assert_eq!(cache.get("changes/bar"), Some(progress(4, 4)));
    }

    #[test]
    fn results_after_invalidation_are_dropped() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        probe.begin("changes/foo");
        cache.invalidate("changes/foo");

        // The worker finished against a file state that may predate the
        // invalidation; its result must not land.
        assert!(!probe.complete("changes/foo", progress(1, 1)));
        assert_eq!(cache.get("changes/foo"), None);
    }

    #[test]
    fn clear_empties_everything() {
        let cache = ProgressCache::new();
        let probe = CacheProbe(&cache);

        probe.begin("changes/foo");
        probe.complete("changes/foo", progress(1, 2));
        probe.begin("changes/bar");

        cache.clear();
        assert!(cache.is_empty());
        assert!(probe.begin("changes/bar"));
    }
}
