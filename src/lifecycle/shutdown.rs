//! Signal handling for graceful shutdown

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Resolves on SIGTERM, SIGINT or an in-process exit request
///
/// Clones share one latch, so an exit requested by a client handler
/// wakes the main loop.
#[derive(Clone)]
pub struct ShutdownSignal {
    requested: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        let (requested, _) = watch::channel(false);
        Self {
            requested: Arc::new(requested),
        }
    }

    /// Request shutdown from inside the process
    pub fn trigger(&self) {
        self.requested.send_replace(true);
    }

    /// Whether shutdown was requested in-process
    pub fn is_triggered(&self) -> bool {
        *self.requested.borrow()
    }

    /// Wait for an in-process request only
    pub async fn requested(&self) {
        let mut rx = self.requested.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) {
        let sigterm = signal(SignalKind::terminate());
        let sigint = signal(SignalKind::interrupt());

        let (mut sigterm, mut sigint) = match (sigterm, sigint) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!(?e, "failed to register signal handlers, waiting for exit request only");
                self.requested().await;
                debug!("exit requested");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = sigint.recv() => {
                debug!("received SIGINT");
            }
            _ = self.requested() => {
                debug!("exit requested");
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_by_clones() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_triggered());

        clone.trigger();
        assert!(signal.is_triggered());
    }

    #[test]
    fn test_requested_resolves_after_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio_test::block_on(signal.requested());
    }

    #[tokio::test]
    async fn test_wait_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(std::time::Duration::from_secs(2), signal.wait())
            .await
            .unwrap();
    }
}
