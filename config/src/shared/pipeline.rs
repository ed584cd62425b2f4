use serde::Deserialize;
use std::time::Duration;

use crate::shared::{RetryConfig, ValidationError};

/// How the source watcher behaves once every available unit has been merged.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Merge every currently available unit, then stop.
    #[default]
    Drain,
    /// Keep waiting for new units until shutdown.
    Stream,
}

/// Configuration shared by all table pipelines of one process.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Identifier of the pipeline, used to isolate checkpoints between pipelines.
    pub id: u64,
    #[serde(default)]
    pub mode: PipelineMode,
    /// How often, in milliseconds, an idle streaming watcher lists the source again.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Backoff for units that fail to be read.
    #[serde(default)]
    pub read_retry: RetryConfig,
    /// Backoff for batches the target table rejects.
    #[serde(default)]
    pub merge_retry: RetryConfig,
}

impl PipelineConfig {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "pipeline.poll_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        self.read_retry.validate("pipeline.read_retry")?;
        self.merge_retry.validate("pipeline.merge_retry")?;

        Ok(())
    }
}

fn default_poll_interval_ms() -> u64 {
    PipelineConfig::DEFAULT_POLL_INTERVAL_MS
}
