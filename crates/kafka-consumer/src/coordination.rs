//! Readiness and drain coordination between the consumer loop and its callers.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Counter of messages pushed to the channel but not yet marked processed.
///
/// Works like a wait group: the consumer loop calls [`add`](Self::add) for
/// every message it pushes, downstream readers call [`done`](Self::done) once
/// a message is fully handled, and shutdown code awaits [`wait`](Self::wait).
/// Nothing enforces that readers call `done`.
#[derive(Debug, Clone)]
pub struct PendingMessages {
    count: Arc<watch::Sender<usize>>,
}

impl Default for PendingMessages {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingMessages {
    pub fn new() -> Self {
        Self {
            count: Arc::new(watch::Sender::new(0)),
        }
    }

    pub fn add(&self, n: usize) {
        self.count.send_modify(|count| *count += n);
    }

    /// Mark one message as processed.
    pub fn done(&self) {
        self.count.send_modify(|count| match count.checked_sub(1) {
            Some(remaining) => *count = remaining,
            None => warn!("PendingMessages::done called with no pending messages"),
        });
    }

    pub fn count(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolve once no messages are pending. Returns immediately if none are.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

/// One-shot gate opened by the first processed partition assignment.
#[derive(Debug)]
pub(crate) struct ReadyGate {
    ready: watch::Sender<bool>,
}

impl ReadyGate {
    pub(crate) fn new() -> Self {
        Self {
            ready: watch::Sender::new(false),
        }
    }

    /// Open the gate. Returns `true` the first time only.
    pub(crate) fn open(&self) -> bool {
        !self.ready.send_replace(true)
    }

    pub(crate) fn is_open(&self) -> bool {
        *self.ready.borrow()
    }

    pub(crate) async fn wait(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
