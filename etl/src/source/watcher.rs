use std::collections::VecDeque;
use std::time::Duration;

use config::shared::PipelineMode;
use tracing::{debug, warn};

use crate::concurrency::arrival::ArrivalNotifier;
use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested, wait_for_shutdown};
use crate::error::EtlResult;
use crate::source::UnitSource;
use crate::types::UnitId;

/// Emits the units of one table that have not been processed yet, each once, in discovery order.
///
/// In [`PipelineMode::Drain`] the watcher ends once a listing yields nothing new. In
/// [`PipelineMode::Stream`] it waits for the poll interval, an arrival notification or shutdown
/// and lists again.
#[derive(Debug)]
pub struct SourceWatcher<S> {
    table: String,
    source: S,
    mode: PipelineMode,
    poll_interval: Duration,
    arrivals: ArrivalNotifier,
    pending: VecDeque<UnitId>,
}

impl<S> SourceWatcher<S>
where
    S: UnitSource,
{
    pub fn new(
        table: impl Into<String>,
        source: S,
        mode: PipelineMode,
        poll_interval: Duration,
        arrivals: ArrivalNotifier,
    ) -> Self {
        Self {
            table: table.into(),
            source,
            mode,
            poll_interval,
            arrivals,
            pending: VecDeque::new(),
        }
    }

    /// Lists the units of the table that are neither done nor already queued, in listing order.
    pub async fn list_new_units<F>(&self, is_done: F) -> EtlResult<Vec<UnitId>>
    where
        F: Fn(&UnitId) -> bool,
    {
        let mut units = self.source.list_units(&self.table).await?;
        units.sort();
        units.dedup();
        units.retain(|unit| !is_done(unit) && !self.pending.contains(unit));

        Ok(units)
    }

    /// Returns the next unit to process, or [`None`] when the watcher is finished.
    ///
    /// The watcher is finished when shutdown is requested, or in drain mode when no new unit is
    /// left. Units for which `is_done` holds are never returned.
    pub async fn next_unit<F>(
        &mut self,
        is_done: F,
        shutdown_rx: &ShutdownRx,
    ) -> EtlResult<Option<UnitId>>
    where
        F: Fn(&UnitId) -> bool,
    {
        loop {
            if is_shutdown_requested(shutdown_rx) {
                return Ok(None);
            }

            while let Some(unit) = self.pending.pop_front() {
                if !is_done(&unit) {
                    return Ok(Some(unit));
                }
            }

            match self.list_new_units(&is_done).await {
                Ok(units) if !units.is_empty() => {
                    debug!(table = %self.table, count = units.len(), "discovered new units");
                    self.pending.extend(units);
                    continue;
                }
                Ok(_) => {}
                Err(err) => match self.mode {
                    PipelineMode::Drain => return Err(err),
                    PipelineMode::Stream => {
                        warn!(table = %self.table, error = %err, "listing source units failed, retrying on next poll");
                    }
                },
            }

            match self.mode {
                PipelineMode::Drain => return Ok(None),
                PipelineMode::Stream => {
                    tokio::select! {
                        biased;

                        _ = wait_for_shutdown(shutdown_rx) => return Ok(None),
                        _ = self.arrivals.notified() => {
                            debug!(table = %self.table, "woken by arrival notification");
                        }
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }
}
