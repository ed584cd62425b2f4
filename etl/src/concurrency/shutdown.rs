//! Broadcast shutdown signal for table workers.
//!
//! Workers observe the signal between pipeline stages and while idle. A unit whose merge
//! committed but whose checkpoint did not is reprocessed after restart, which the idempotent
//! merge absorbs.

use tokio::sync::watch;

/// Receiving side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<()>;

/// Sending side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Asks every subscribed worker to stop.
    ///
    /// Fails only when no worker is listening anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Returns a new receiver that observes future shutdown requests.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}

/// Returns whether shutdown was requested on `rx`.
///
/// A dropped sender counts as a request, since nobody can ask for a clean stop anymore.
pub fn is_shutdown_requested(rx: &ShutdownRx) -> bool {
    rx.has_changed().unwrap_or(true)
}

/// Completes once shutdown is requested on `rx`.
///
/// Waits on a clone so that `rx` itself keeps reporting the request through
/// [`is_shutdown_requested`].
pub async fn wait_for_shutdown(rx: &ShutdownRx) {
    let mut rx = rx.clone();
    // An error means the sender is gone, which also ends the wait.
    let _ = rx.changed().await;
}
