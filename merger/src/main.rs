//! Merger service binary.
//!
//! Loads the configuration, initializes telemetry and Sentry, then runs the merge pipeline over
//! every configured table until the source is drained or the process is asked to stop.

use config::shared::MergerConfig;
use config::{Environment, load_config};
use telemetry::metrics::init_metrics;
use telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::core::start_merger;

mod core;
mod sentry;

/// Name of the environment variable which contains version information for this merger.
const APP_VERSION_ENV_NAME: &str = "APP_VERSION";

fn main() -> anyhow::Result<()> {
    let environment = Environment::load()?;
    let merger_config: MergerConfig = load_config()?;
    merger_config.validate()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), environment.structured_logs())?;

    // Sentry is initialized before the runtime so panics in any worker thread are captured.
    let _sentry_guard = sentry::init(&merger_config, environment)?;

    init_metrics(merger_config.pipeline.id)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(merger_config))?;

    Ok(())
}

async fn async_main(merger_config: MergerConfig) -> anyhow::Result<()> {
    if let Err(err) = start_merger(merger_config).await {
        sentry::capture_error(&err);
        error!("{err:#}");

        return Err(err);
    }

    info!("merger finished");

    Ok(())
}
