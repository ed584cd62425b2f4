use std::sync::Arc;

use tokio::sync::Notify;

/// Wakes idle streaming workers when new units arrive.
///
/// Notifications are a hint: a worker that was not waiting misses it and picks the unit up on
/// its next poll instead.
#[derive(Debug, Clone, Default)]
pub struct ArrivalNotifier {
    inner: Arc<Notify>,
}

impl ArrivalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes every worker currently waiting for arrivals.
    pub fn notify(&self) {
        self.inner.notify_waiters();
    }

    /// Completes on the next [`ArrivalNotifier::notify`] call.
    pub async fn notified(&self) {
        self.inner.notified().await
    }
}
