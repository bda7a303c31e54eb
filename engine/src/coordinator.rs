//! Change coordinator.
//!
//! Consumes the raw change stream from the provider's watch subscription
//! and turns it into two effects: a debounced full project reload, and
//! targeted bookkeeping that does not wait for the debounce — checklist
//! events invalidate exactly the owning folder's progress entry, and
//! events touching the currently open file clear it (deletion) or
//! schedule a short re-read (anything else).
//!
//! One watch subscription exists per session, keyed by the session's
//! identifier. Subscribing against the already-watched root is a no-op;
//! a different root replaces the subscription. Events carrying a foreign
//! subscription key are ignored.

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::provider::{FileSystemProvider, ProviderResult};
use crate::session::Session;
use crate::types::{ChangeEvent, ChangeKind};
use crate::util::debounce::Debouncer;
use crate::util::paths;

/// Capacity of the raw event channel between provider and pump.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Watch binding state: `Unwatched` is an empty binding, `Watching` a
/// populated one. The only transitions are subscribe (on load) and
/// teardown (on reset or root change).
#[derive(Default)]
struct Binding {
    watched_path: Option<String>,
    event_pump: Option<JoinHandle<()>>,
    reload_pump: Option<JoinHandle<()>>,
    file_pump: Option<JoinHandle<()>>,
}

/// Per-session owner of the watch subscription and its debouncers.
pub(crate) struct ChangeCoordinator {
    key: String,
    binding: Mutex<Binding>,
}

impl ChangeCoordinator {
    /// Creates a coordinator in the unwatched state.
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            binding: Mutex::new(Binding::default()),
        }
    }

    /// Ensures a watch subscription exists for `root`.
    ///
    /// Idempotent for the currently watched root. A different root tears
    /// down the previous subscription and establishes a new one.
    pub(crate) fn ensure_watching<'a>(
        &'a self,
        session: &'a Session,
        root: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ProviderResult<()>> + Send + 'a>> {
        // Hand-written boxed return instead of `async fn`: the spawned
        // reload pump below calls back into `Session::load_project`, which
        // awaits this method — a load→watch→reload cycle. A named `Send`
        // future type breaks that cycle, which opaque `async fn` return
        // types cannot (rustc fails `Send` inference at the `tokio::spawn`).
        Box::pin(self.ensure_watching_inner(session, root))
    }

    async fn ensure_watching_inner(&self, session: &Session, root: &str) -> ProviderResult<()> {
        let mut binding = self.binding.lock().await;
        if binding.watched_path.as_deref() == Some(root) {
            trace!(key = %self.key, root = %root, "Already watching, skipping");
            return Ok(());
        }

        self.teardown_binding(&mut binding, session.provider()).await;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        session.provider().watch(&self.key, root, event_tx).await?;

        // Debounced reload path: any relevant event schedules a full
        // reload, bursts collapse to one.
        let (reload_tx, mut reload_rx) = mpsc::channel::<((), ())>(8);
        let reload_debouncer = Debouncer::new(session.config().reload_debounce, reload_tx);
        let reload_session = session.clone();
        let reload_pump = tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                debug!("Debounce elapsed, reloading project");
                reload_session.load_project().await;
            }
        });

        // Open-file path: shorter delay than the reload debounce so
        // single-file feedback stays responsive.
        let (file_tx, mut file_rx) = mpsc::channel::<(String, ())>(8);
        let file_debouncer = Debouncer::new(session.config().file_reload_delay, file_tx);
        let file_session = session.clone();
        let file_pump = tokio::spawn(async move {
            while let Some((path, ())) = file_rx.recv().await {
                if file_session.current_file_path().await.as_deref() == Some(path.as_str()) {
                    debug!(path = %path, "Re-reading open file after change");
                    file_session.load_file(&path).await;
                }
            }
        });

        let event_pump = tokio::spawn(run_event_pump(
            session.clone(),
            self.key.clone(),
            root.to_string(),
            event_rx,
            reload_debouncer,
            file_debouncer,
        ));

        debug!(key = %self.key, root = %root, "Watch subscription established");
        binding.watched_path = Some(root.to_string());
        binding.event_pump = Some(event_pump);
        binding.reload_pump = Some(reload_pump);
        binding.file_pump = Some(file_pump);
        Ok(())
    }

    /// Tears down the subscription and all pending timers. Idempotent.
    pub(crate) async fn teardown(&self, provider: &dyn FileSystemProvider) {
        let mut binding = self.binding.lock().await;
        self.teardown_binding(&mut binding, provider).await;
    }

    async fn teardown_binding(&self, binding: &mut Binding, provider: &dyn FileSystemProvider) {
        if binding.watched_path.is_none() {
            return;
        }
        // Aborting the event pump drops the debouncers, which discards
        // anything still pending.
        for handle in [
            binding.event_pump.take(),
            binding.reload_pump.take(),
            binding.file_pump.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        binding.watched_path = None;
        if let Err(e) = provider.unwatch(&self.key).await {
            warn!(key = %self.key, error = %e, "Failed to unsubscribe watch");
        }
        debug!(key = %self.key, "Watch subscription torn down");
    }
}

/// Routes raw change events to invalidation, open-file handling, and the
/// debounced reload.
async fn run_event_pump(
    session: Session,
    key: String,
    root: String,
    mut events: mpsc::Receiver<ChangeEvent>,
    reload_debouncer: Debouncer<(), ()>,
    file_debouncer: Debouncer<String, ()>,
) {
    while let Some(event) = events.recv().await {
        if event.key != key {
            trace!(key = %key, event_key = %event.key, "Ignoring foreign subscription event");
            continue;
        }
        let Some(rel) = paths::project_relative(&event.path, &root) else {
            continue;
        };
        trace!(path = %rel, kind = ?event.kind, "Change event");

        // Checklist changes invalidate exactly the owning folder, without
        // waiting for the debounce.
        if paths::is_checklist(&rel) {
            if let Some(parent) = paths::parent(&rel) {
                session.invalidate_progress(parent);
            }
        }

        // The open file gets immediate deletion handling and a fast
        // re-read for everything else.
        if session.current_file_path().await.as_deref() == Some(rel.as_str()) {
            if event.kind == ChangeKind::Removed {
                debug!(path = %rel, "Open file deleted, clearing");
                session.clear_current_file().await;
            } else {
                file_debouncer.send(rel.clone(), ()).await;
            }
        }

        reload_debouncer.send((), ()).await;
    }
    debug!(key = %key, "Event pump shutting down");
}
