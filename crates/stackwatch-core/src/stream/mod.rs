// ── Reactive store subscriptions ──
//
// Whole-store change notification. Dropping the handle unsubscribes.

use tokio::sync::watch;

/// Change notification for the whole store.
///
/// Every mutating store operation bumps a version before returning;
/// `changed()` resolves once per observed bump (coalescing bursts).
pub struct StoreSubscription {
    receiver: watch::Receiver<u64>,
}

impl StoreSubscription {
    pub(crate) fn new(mut receiver: watch::Receiver<u64>) -> Self {
        receiver.mark_unchanged();
        Self { receiver }
    }

    /// Version seen most recently by this handle.
    pub fn version(&self) -> u64 {
        *self.receiver.borrow()
    }

    /// Whether the store changed since the last `changed()`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next mutation and return the new version.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<u64> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }
}
