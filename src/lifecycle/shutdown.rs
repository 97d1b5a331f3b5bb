//! Graceful shutdown orchestration (§5).
//!
//! # Shutdown Sequence
//! 1. Stop accepting new connections
//! 2. Wait for in-flight requests to complete, up to `drain_deadline`
//! 3. Cancel residual requests, stop health-check tasks
//! 4. Exit
//!
//! # Design Decisions
//! - Drain has a timeout: requests still running past the deadline are
//!   abandoned, not waited on forever
//! - A single `broadcast::Sender<()>` is the fan-out signal; every
//!   subscriber (health tasks, config watcher, the accept loop) reacts to
//!   the same tick

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};

/// Shared shutdown handle. Cloning is cheap; every clone observes the same
/// signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    drained: Arc<Notify>,
    drain_deadline: Duration,
}

impl Shutdown {
    pub fn new(drain_deadline: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, drained: Arc::new(Notify::new()), drain_deadline }
    }

    /// Subscribe to the shutdown signal (for health tasks, config watcher).
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Raw sender, for components that manage their own subscriber list
    /// (e.g. `health::active::HealthRegistry::spawn_all`).
    pub fn sender(&self) -> &broadcast::Sender<()> {
        &self.tx
    }

    /// Trigger shutdown. Idempotent: firing twice is harmless, the second
    /// send just has no remaining effect beyond a log line.
    pub fn trigger(&self) {
        tracing::info!("shutdown signal received, draining in-flight requests");
        let _ = self.tx.send(());
    }

    /// Wait until shutdown has been triggered.
    pub async fn recv(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.recv().await;
    }

    /// Mark the in-flight request count as drained (called by the accept
    /// loop once its outstanding-request counter reaches zero).
    pub fn notify_drained(&self) {
        self.drained.notify_waiters();
    }

    /// Wait for drain completion or the deadline, whichever comes first.
    /// Returns `true` if drain completed cleanly.
    pub async fn wait_for_drain(&self) -> bool {
        tokio::select! {
            _ = self.drained.notified() => true,
            _ = tokio::time::sleep(self.drain_deadline) => {
                tracing::warn!(deadline_secs = self.drain_deadline.as_secs(), "drain deadline exceeded, forcing shutdown");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_subscribers() {
        let shutdown = Shutdown::new(Duration::from_millis(50));
        let mut rx = shutdown.subscribe();
        shutdown.trigger();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn drain_times_out_without_notify() {
        let shutdown = Shutdown::new(Duration::from_millis(10));
        assert!(!shutdown.wait_for_drain().await);
    }

    #[tokio::test]
    async fn drain_completes_on_notify() {
        let shutdown = Shutdown::new(Duration::from_secs(5));
        let s2 = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            s2.notify_drained();
        });
        assert!(shutdown.wait_for_drain().await);
    }
}
