//! Interrupt handle shared between the signal handler, the engine and its loops

use std::sync::Arc;
use tokio::sync::watch;

/// A one-way cancellation switch that can be polled or awaited
///
/// Clones share the same switch. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct Interrupt {
    switch: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (switch, _) = watch::channel(false);
        Self {
            switch: Arc::new(switch),
        }
    }

    pub fn trigger(&self) {
        self.switch.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.switch.borrow()
    }

    /// Resolves once the interrupt has been triggered (immediately if it already was)
    pub async fn triggered(&self) {
        let mut watcher = self.switch.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = watcher.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
