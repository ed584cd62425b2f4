//! Multi-table merge pipeline.

use std::sync::Arc;

use config::shared::PipelineConfig;
use futures::future::join_all;
use tracing::{error, info};

use crate::bail;
use crate::concurrency::arrival::ArrivalNotifier;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::schema::SchemaRegistry;
use crate::source::UnitSource;
use crate::store::checkpoint::CheckpointStore;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::table::{TableRunSummary, TableWorker, TableWorkerHandle};

pub type PipelineId = u64;

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started { workers: Vec<TableWorkerHandle> },
}

/// Runs one [`TableWorker`] per registered table, concurrently and independently.
///
/// A failing table stops only its own worker. [`Pipeline::wait`] reports every failure at once.
#[derive(Debug)]
pub struct Pipeline<S, D, C> {
    id: PipelineId,
    config: Arc<PipelineConfig>,
    registry: SchemaRegistry,
    source: S,
    destination: D,
    store: C,
    arrivals: ArrivalNotifier,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<S, D, C> Pipeline<S, D, C>
where
    S: UnitSource + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
    C: CheckpointStore + Clone + Send + Sync + 'static,
{
    pub fn new(
        config: PipelineConfig,
        registry: SchemaRegistry,
        source: S,
        destination: D,
        store: C,
    ) -> Self {
        // Workers subscribe through the sender, the initial receiver is not needed.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            id: config.id,
            config: Arc::new(config),
            registry,
            source,
            destination,
            store,
            arrivals: ArrivalNotifier::new(),
            state: PipelineState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Returns the notifier an external collector can use to wake streaming workers.
    pub fn arrivals(&self) -> ArrivalNotifier {
        self.arrivals.clone()
    }

    /// Returns the handles of the running table workers, empty before start.
    pub fn workers(&self) -> &[TableWorkerHandle] {
        match &self.state {
            PipelineState::NotStarted => &[],
            PipelineState::Started { workers } => workers,
        }
    }

    /// Starts a worker for every registered table.
    ///
    /// When a worker fails to start, the ones already started are asked to shut down and the
    /// startup error is returned.
    pub async fn start(&mut self) -> EtlResult<()> {
        if let PipelineState::Started { .. } = self.state {
            bail!(ErrorKind::InvalidState, "Pipeline was already started");
        }

        info!(
            pipeline_id = self.id,
            tables = self.registry.len(),
            mode = ?self.config.mode,
            "starting pipeline"
        );

        let mut workers = Vec::with_capacity(self.registry.len());
        for table in self.registry.tables() {
            let worker = TableWorker::new(
                self.id,
                self.config.clone(),
                table.clone(),
                self.source.clone(),
                self.destination.clone(),
                self.store.clone(),
                self.arrivals.clone(),
                self.shutdown_tx.subscribe(),
            );

            match worker.start().await {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    error!(table = table.name(), error = %err, "failed to start table worker");
                    self.state = PipelineState::Started { workers };
                    self.shutdown();
                    return Err(err);
                }
            }
        }

        self.state = PipelineState::Started { workers };

        Ok(())
    }

    /// Waits for every table worker to stop.
    ///
    /// Returns the summaries of all tables, or the errors of every failed table aggregated into
    /// one error.
    pub async fn wait(self) -> EtlResult<Vec<TableRunSummary>> {
        let PipelineState::Started { workers } = self.state else {
            info!("pipeline was not started, nothing to wait for");
            return Ok(Vec::new());
        };
        // Dropping the sender would read as a shutdown request.
        let _shutdown_tx = self.shutdown_tx;

        info!(workers = workers.len(), "waiting for table workers to complete");

        let tables: Vec<String> = workers.iter().map(|w| w.table().to_owned()).collect();
        let results = join_all(workers.into_iter().map(|worker| worker.wait())).await;

        let mut summaries = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (table, result) in tables.into_iter().zip(results) {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    error!(table = %table, error = %err, "table worker failed");
                    errors.push(err);
                }
            }
        }

        if let Err(err) = self.destination.shutdown().await {
            errors.push(err);
        }

        if !errors.is_empty() {
            info!(failed = errors.len(), "pipeline completed with errors");
            return Err(errors.into());
        }

        info!("pipeline completed");

        Ok(summaries)
    }

    /// Asks every table worker to stop after its current step.
    pub fn shutdown(&self) {
        info!("trying to shut down the pipeline");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the pipeline: {}", err);
            return;
        }

        info!("shut down signal successfully sent to all workers");
    }

    pub async fn shutdown_and_wait(self) -> EtlResult<Vec<TableRunSummary>> {
        self.shutdown();
        self.wait().await
    }
}
