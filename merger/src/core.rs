use std::path::{Path, PathBuf};

use config::shared::{CheckpointConfig, DestinationConfig, MergerConfig};
use etl::destination::Destination;
use etl::destination::file::FileDestination;
use etl::destination::memory::MemoryDestination;
use etl::pipeline::{Pipeline, PipelineId};
use etl::schema::SchemaRegistry;
use etl::source::{DirectorySource, UnitSource};
use etl::store::checkpoint::CheckpointStore;
use etl::store::checkpoint::file::FileCheckpointStore;
use etl::store::checkpoint::memory::MemoryCheckpointStore;
use etl::workers::table::TableRunSummary;
use tracing::{error, info, warn};

// Pipelines are generic over their destination and checkpoint store, so every combination is
// built and started separately.
macro_rules! start_pipeline_dispatch {
    ($config:expr, $registry:expr, $source:expr, $destination:expr, $store:expr) => {{
        let pipeline = Pipeline::new($config, $registry, $source, $destination, $store);
        start_pipeline(pipeline).await
    }};
}

/// Builds the pipeline described by `config` and runs it to completion.
pub async fn start_merger(config: MergerConfig) -> anyhow::Result<Vec<TableRunSummary>> {
    let registry = SchemaRegistry::from_config(&config.tables)?;
    info!(
        pipeline_id = config.pipeline.id,
        tables = registry.len(),
        source = %config.source.root_dir.display(),
        "starting merger"
    );

    let source = DirectorySource::new(config.source.root_dir.clone());
    let pipeline_config = config.pipeline.clone();

    let summaries = match (&config.destination, &config.checkpoint) {
        (DestinationConfig::Memory, CheckpointConfig::Memory) => {
            warn!("neither merged tables nor checkpoints are durable, all progress is lost on exit");
            start_pipeline_dispatch!(
                pipeline_config,
                registry,
                source,
                MemoryDestination::new(),
                MemoryCheckpointStore::new()
            )?
        }
        (DestinationConfig::Memory, CheckpointConfig::File { dir }) => {
            warn!("merged tables are not durable while checkpoints are, restarts skip merged units");
            start_pipeline_dispatch!(
                pipeline_config,
                registry,
                source,
                MemoryDestination::new(),
                FileCheckpointStore::new(checkpoint_dir(dir, config.pipeline.id)).await?
            )?
        }
        (DestinationConfig::File { dir: table_dir }, CheckpointConfig::Memory) => {
            start_pipeline_dispatch!(
                pipeline_config,
                registry,
                source,
                FileDestination::new(table_dir.clone()).await?,
                MemoryCheckpointStore::new()
            )?
        }
        (DestinationConfig::File { dir: table_dir }, CheckpointConfig::File { dir }) => {
            start_pipeline_dispatch!(
                pipeline_config,
                registry,
                source,
                FileDestination::new(table_dir.clone()).await?,
                FileCheckpointStore::new(checkpoint_dir(dir, config.pipeline.id)).await?
            )?
        }
    };

    for summary in &summaries {
        info!(
            table = %summary.table,
            units_merged = summary.units_merged,
            units_skipped = summary.units_skipped,
            rows_inserted = summary.rows_inserted,
            rows_updated = summary.rows_updated,
            "table summary"
        );
    }

    Ok(summaries)
}

/// Checkpoints of different pipelines sharing a directory must not collide.
fn checkpoint_dir(dir: &Path, pipeline_id: PipelineId) -> PathBuf {
    dir.join(format!("pipeline_{pipeline_id}"))
}

async fn start_pipeline<S, D, C>(
    mut pipeline: Pipeline<S, D, C>,
) -> anyhow::Result<Vec<TableRunSummary>>
where
    S: UnitSource + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
    C: CheckpointStore + Clone + Send + Sync + 'static,
{
    pipeline.start().await?;

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        if let Err(err) = wait_for_signal().await {
            error!("failed to listen for shutdown signals: {err}");
            return;
        }

        info!("shutdown signal received, stopping pipeline after the current step");
        if let Err(err) = shutdown_tx.shutdown() {
            warn!("failed to send shutdown signal: {err}");
        }
    });

    let result = pipeline.wait().await;

    // The pipeline may finish on its own in drain mode, the listener is no longer needed.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    Ok(result?)
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
