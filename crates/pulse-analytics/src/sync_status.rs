//! Observable upload status for analytics events

use pulse_core::SyncStatus;
use tokio::sync::watch;
use tracing::trace;

/// Outcome of draining a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    /// Entries sent and removed from the store
    pub uploaded: usize,
    /// Entries buffered when the drain started
    pub total: usize,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.uploaded == self.total
    }
}

/// Latest-value signal of the analytics [`SyncStatus`]
///
/// Observers subscribe and see every transition that happens after they
/// last looked; intermediate values may be coalesced.
#[derive(Debug)]
pub struct SyncStatusTracker {
    sender: watch::Sender<SyncStatus>,
}

impl Default for SyncStatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStatusTracker {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SyncStatus::InitialUnknown);
        Self { sender }
    }

    pub fn current(&self) -> SyncStatus {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.sender.subscribe()
    }

    /// Publish a new status, even with no subscribers
    pub(crate) fn set(&self, status: SyncStatus) {
        let previous = self.sender.send_replace(status);
        if previous != status {
            trace!(from = ?previous, to = ?status, "Sync status changed");
        }
    }
}
