use std::future::Future;

use crate::error::EtlResult;

/// A background worker started from a configuration and run on its own task.
///
/// `H` is the handle returned on start and `S` the state observable through it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Prepares the worker, spawns it and returns a handle to it.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle to a running worker.
pub trait WorkerHandle<S> {
    /// Value the worker produces when it finishes.
    type Output;

    /// Returns the worker's current state.
    ///
    /// The state is a snapshot and may be outdated as soon as it is returned.
    fn state(&self) -> S;

    /// Waits for the worker to finish and returns its output.
    fn wait(self) -> impl Future<Output = EtlResult<Self::Output>> + Send;
}
