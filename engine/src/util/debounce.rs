//! Keyed debouncer for coalescing rapid events.
//!
//! Bursts of filesystem changes must collapse into one reload, and rapid
//! edits to the open file into one re-read. The debouncer holds the latest
//! value per key until a quiet period has elapsed since the last event for
//! that key, then emits it on the output channel.
//!
//! Dropping the debouncer cancels everything still pending — a session
//! reset must not fire a trailing reload.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A pending event waiting for its quiet period to elapse.
#[derive(Debug)]
struct Pending<V> {
    value: V,
    deadline: Instant,
}

/// Coalesces rapid events by key; the latest value per key wins.
#[derive(Debug)]
pub struct Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    input_tx: mpsc::Sender<(K, V)>,
    task: tokio::task::JoinHandle<()>,
}

impl<K, V> Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + std::fmt::Debug + 'static,
    V: Send + 'static,
{
    /// Creates a debouncer emitting on `output_tx` after `interval` of
    /// quiet per key.
    #[must_use]
    pub fn new(interval: Duration, output_tx: mpsc::Sender<(K, V)>) -> Self {
        let (input_tx, input_rx) = mpsc::channel(256);
        let task = tokio::spawn(run_loop(interval, input_rx, output_tx));
        Self { input_tx, task }
    }

    /// Submits an event, replacing any pending value for the same key and
    /// restarting that key's timer.
    pub async fn send(&self, key: K, value: V) {
        if self.input_tx.send((key, value)).await.is_err() {
            debug!("debouncer task gone, dropping event");
        }
    }
}

impl<K, V> Drop for Debouncer<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    fn drop(&mut self) {
        // Pending events are discarded, not flushed.
        self.task.abort();
    }
}

async fn run_loop<K, V>(
    interval: Duration,
    mut input_rx: mpsc::Receiver<(K, V)>,
    output_tx: mpsc::Sender<(K, V)>,
) where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    let mut pending: HashMap<K, Pending<V>> = HashMap::new();

    loop {
        let next_deadline = pending.values().map(|p| p.deadline).min();

        tokio::select! {
            event = input_rx.recv() => {
                match event {
                    Some((key, value)) => {
                        trace!(key = ?key, "debounce event");
                        pending.insert(key, Pending {
                            value,
                            deadline: Instant::now() + interval,
                        });
                    }
                    None => break,
                }
            }
            _ = sleep_until_or_forever(next_deadline) => {
                let now = Instant::now();
                let due: Vec<K> = pending
                    .iter()
                    .filter(|(_, p)| p.deadline <= now)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in due {
                    if let Some(p) = pending.remove(&key) {
                        trace!(key = ?key, "debounce emit");
                        if output_tx.send((key, p.value)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Sleeps until the deadline, or forever when nothing is pending.
async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
