//! Shutdown coordination.
//!
//! Termination signals and the privileged `/shutdown` endpoint converge on
//! the same coordinator; every long-running task subscribes to its
//! broadcast channel.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Cloning yields a handle to the same channel, so request handlers and
/// background tasks can all trigger or observe the one shutdown event.
/// Triggering is idempotent.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Safe to call more than once.
    pub fn trigger(&self) {
        // Send fails only when nothing is listening, which is fine.
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
