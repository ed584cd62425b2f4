use std::sync::Arc;
use std::time::Duration;

use config::shared::{PipelineConfig, RetryConfig};
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::checkpoint::CheckpointManager;
use crate::concurrency::arrival::ArrivalNotifier;
use crate::concurrency::shutdown::{ShutdownRx, is_shutdown_requested, wait_for_shutdown};
use crate::dedup::deduplicate;
use crate::destination::Destination;
use crate::error::{EtlError, EtlResult};
use crate::merge::{MergeEngine, MergeResult};
use crate::metrics::{
    ERROR_KIND_LABEL, ETL_MERGE_RETRIES_TOTAL, ETL_UNITS_PROCESSED_TOTAL, ETL_UNITS_SKIPPED_TOTAL,
    TABLE_NAME_LABEL,
};
use crate::reader::BatchReader;
use crate::source::{SourceWatcher, UnitSource};
use crate::state::table::PipelinePhase;
use crate::store::checkpoint::CheckpointStore;
use crate::types::{Batch, TableDefinition, UnitId};
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::policy::{RetryDirective, build_error_handling_policy};

/// Totals of one table worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRunSummary {
    pub table: String,
    pub units_merged: u64,
    pub units_skipped: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
}

/// Worker merging the units of one table, one at a time, in discovery order.
#[derive(Debug)]
pub struct TableWorker<S, D, C> {
    pipeline_id: u64,
    config: Arc<PipelineConfig>,
    table: Arc<TableDefinition>,
    source: S,
    destination: D,
    store: C,
    arrivals: ArrivalNotifier,
    shutdown_rx: ShutdownRx,
}

impl<S, D, C> TableWorker<S, D, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline_id: u64,
        config: Arc<PipelineConfig>,
        table: Arc<TableDefinition>,
        source: S,
        destination: D,
        store: C,
        arrivals: ArrivalNotifier,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            pipeline_id,
            config,
            table,
            source,
            destination,
            store,
            arrivals,
            shutdown_rx,
        }
    }
}

impl<S, D, C> Worker<TableWorkerHandle, PipelinePhase> for TableWorker<S, D, C>
where
    S: UnitSource + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
    C: CheckpointStore + Clone + Send + Sync + 'static,
{
    type Error = EtlError;

    /// Opens the target table and loads the checkpoint, then spawns the merge loop.
    async fn start(self) -> EtlResult<TableWorkerHandle> {
        let table_name = self.table.name().to_owned();
        info!(pipeline_id = self.pipeline_id, table = %table_name, "starting table worker");

        self.destination.ensure_table(&self.table).await?;
        let checkpoint = CheckpointManager::load(table_name.clone(), self.store).await?;

        let (phase_tx, phase_rx) = watch::channel(PipelinePhase::Idle);
        let run = TableRun {
            config: self.config.clone(),
            table: self.table.clone(),
            watcher: SourceWatcher::new(
                table_name.clone(),
                self.source.clone(),
                self.config.mode,
                self.config.poll_interval(),
                self.arrivals,
            ),
            reader: BatchReader::new(self.source, self.table.clone()),
            merge_engine: MergeEngine::new(self.destination, self.table.clone()),
            checkpoint,
            phase_tx,
            shutdown_rx: self.shutdown_rx,
            summary: TableRunSummary {
                table: table_name.clone(),
                ..TableRunSummary::default()
            },
        };

        let span = info_span!("table_worker", pipeline_id = self.pipeline_id, table = %table_name);
        let handle = tokio::spawn(run.run().instrument(span));

        Ok(TableWorkerHandle {
            table: table_name,
            phase_rx,
            handle,
        })
    }
}

/// Handle to a running [`TableWorker`].
#[derive(Debug)]
pub struct TableWorkerHandle {
    table: String,
    phase_rx: watch::Receiver<PipelinePhase>,
    handle: JoinHandle<EtlResult<TableRunSummary>>,
}

impl TableWorkerHandle {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns a receiver notified on every phase change.
    pub fn subscribe(&self) -> watch::Receiver<PipelinePhase> {
        self.phase_rx.clone()
    }
}

impl WorkerHandle<PipelinePhase> for TableWorkerHandle {
    type Output = TableRunSummary;

    fn state(&self) -> PipelinePhase {
        self.phase_rx.borrow().clone()
    }

    /// Waits for the worker to exit. A panicking worker yields a
    /// [`crate::error::ErrorKind::TableWorkerPanic`] error.
    async fn wait(self) -> EtlResult<TableRunSummary> {
        self.handle.await?
    }
}

struct TableRun<S, D, C> {
    config: Arc<PipelineConfig>,
    table: Arc<TableDefinition>,
    watcher: SourceWatcher<S>,
    reader: BatchReader<S>,
    merge_engine: MergeEngine<D>,
    checkpoint: CheckpointManager<C>,
    phase_tx: watch::Sender<PipelinePhase>,
    shutdown_rx: ShutdownRx,
    summary: TableRunSummary,
}

impl<S, D, C> TableRun<S, D, C>
where
    S: UnitSource + Send + Sync,
    D: Destination + Send + Sync,
    C: CheckpointStore + Send + Sync,
{
    async fn run(mut self) -> EtlResult<TableRunSummary> {
        let result = self.run_loop().await;
        self.set_phase(PipelinePhase::Stopped);

        match result {
            Ok(()) => {
                info!(
                    units_merged = self.summary.units_merged,
                    units_skipped = self.summary.units_skipped,
                    rows_inserted = self.summary.rows_inserted,
                    rows_updated = self.summary.rows_updated,
                    "table worker stopped"
                );
                Ok(self.summary)
            }
            Err(err) => {
                let policy = build_error_handling_policy(&err);
                error!(error = %err, solution = policy.solution(), "table worker stopped with an error");
                Err(err)
            }
        }
    }

    async fn run_loop(&mut self) -> EtlResult<()> {
        loop {
            self.set_phase(PipelinePhase::Idle);

            let checkpoint = &self.checkpoint;
            let next = self
                .watcher
                .next_unit(|unit_id| checkpoint.is_done(unit_id), &self.shutdown_rx)
                .await?;
            let Some(unit_id) = next else {
                return Ok(());
            };

            self.set_phase(PipelinePhase::BatchPending {
                unit_id: unit_id.clone(),
            });
            self.process_unit(&unit_id).await?;
        }
    }

    /// Reads, deduplicates, merges and checkpoints one unit.
    ///
    /// Returns `Ok` without checkpointing when the unit was skipped or shutdown interrupted it.
    async fn process_unit(&mut self, unit_id: &UnitId) -> EtlResult<()> {
        let Some(batch) = self.read_unit(unit_id).await? else {
            return Ok(());
        };
        if is_shutdown_requested(&self.shutdown_rx) {
            return Ok(());
        }

        self.set_phase(PipelinePhase::Deduplicating {
            unit_id: unit_id.clone(),
        });
        let batch = deduplicate(&self.table, batch);
        if is_shutdown_requested(&self.shutdown_rx) {
            return Ok(());
        }

        let Some(result) = self.merge_batch(&batch).await? else {
            return Ok(());
        };

        self.set_phase(PipelinePhase::Checkpointing {
            unit_id: unit_id.clone(),
        });
        self.checkpoint.commit(&batch).await?;

        self.summary.units_merged += 1;
        self.summary.rows_inserted += result.inserted as u64;
        self.summary.rows_updated += result.updated as u64;
        counter!(ETL_UNITS_PROCESSED_TOTAL, TABLE_NAME_LABEL => self.table.name().to_owned())
            .increment(1);

        Ok(())
    }

    /// Reads a unit, retrying transient failures. [`None`] when the unit was skipped or shutdown
    /// interrupted the retries.
    async fn read_unit(&mut self, unit_id: &UnitId) -> EtlResult<Option<Batch>> {
        let config = self.config.clone();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.set_phase(PipelinePhase::Reading {
                unit_id: unit_id.clone(),
            });

            let err = match self
                .reader
                .read(unit_id, self.checkpoint.next_batch_id())
                .await
            {
                Ok(batch) => return Ok(Some(batch)),
                Err(err) => err,
            };

            match build_error_handling_policy(&err).retry_directive() {
                RetryDirective::Timed if attempt < config.read_retry.max_attempts => {
                    if !self
                        .retry_after(unit_id, &err, attempt, &config.read_retry)
                        .await
                    {
                        return Ok(None);
                    }
                }
                // Retries are exhausted. The skip is not persisted so a restart tries again.
                RetryDirective::Timed => {
                    self.skip_unit(unit_id, &err, attempt, false).await?;
                    return Ok(None);
                }
                RetryDirective::Skip => {
                    self.skip_unit(unit_id, &err, attempt, true).await?;
                    return Ok(None);
                }
                RetryDirective::Fatal => return Err(err),
            }
        }
    }

    /// Merges a deduplicated batch, retrying transient failures. Exhausted retries stop the
    /// worker with the last error. [`None`] when shutdown interrupted the retries.
    async fn merge_batch(&mut self, batch: &Batch) -> EtlResult<Option<MergeResult>> {
        let config = self.config.clone();
        let unit_id = batch.unit_id();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.set_phase(PipelinePhase::Merging {
                unit_id: unit_id.clone(),
            });

            let err = match self.merge_engine.merge(batch).await {
                Ok(result) => return Ok(Some(result)),
                Err(err) => err,
            };

            match build_error_handling_policy(&err).retry_directive() {
                RetryDirective::Timed if attempt < config.merge_retry.max_attempts => {
                    counter!(
                        ETL_MERGE_RETRIES_TOTAL,
                        TABLE_NAME_LABEL => self.table.name().to_owned(),
                        ERROR_KIND_LABEL => err.kind().as_str()
                    )
                    .increment(1);

                    if !self
                        .retry_after(unit_id, &err, attempt, &config.merge_retry)
                        .await
                    {
                        return Ok(None);
                    }
                }
                _ => {
                    self.set_phase(PipelinePhase::Error {
                        unit_id: unit_id.clone(),
                        kind: err.kind(),
                        attempt,
                    });
                    error!(%unit_id, attempt, error = %err, "merge failed, halting table");
                    return Err(err);
                }
            }
        }
    }

    /// Enters the error phase and waits for the backoff delay. Returns `false` when shutdown
    /// was requested meanwhile.
    async fn retry_after(
        &mut self,
        unit_id: &UnitId,
        err: &EtlError,
        attempt: u32,
        retry: &RetryConfig,
    ) -> bool {
        let delay = retry.delay_for_attempt(attempt);
        self.set_phase(PipelinePhase::Error {
            unit_id: unit_id.clone(),
            kind: err.kind(),
            attempt,
        });
        warn!(
            %unit_id,
            attempt,
            max_attempts = retry.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "step failed, retrying"
        );

        self.backoff(delay).await
    }

    async fn skip_unit(
        &mut self,
        unit_id: &UnitId,
        err: &EtlError,
        attempt: u32,
        persist: bool,
    ) -> EtlResult<()> {
        let kind = err.kind();
        self.set_phase(PipelinePhase::Error {
            unit_id: unit_id.clone(),
            kind,
            attempt,
        });
        error!(
            %unit_id,
            attempt,
            persist,
            error = %err,
            solution = build_error_handling_policy(err).solution(),
            "skipping unit"
        );

        self.checkpoint.skip(unit_id, kind, persist).await?;
        self.summary.units_skipped += 1;
        counter!(
            ETL_UNITS_SKIPPED_TOTAL,
            TABLE_NAME_LABEL => self.table.name().to_owned(),
            ERROR_KIND_LABEL => kind.as_str()
        )
        .increment(1);

        Ok(())
    }

    async fn backoff(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(&self.shutdown_rx) => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn set_phase(&self, phase: PipelinePhase) {
        debug!(phase = %phase.as_type(), unit_id = ?phase.unit_id(), "phase changed");
        self.phase_tx.send_replace(phase);
    }
}
