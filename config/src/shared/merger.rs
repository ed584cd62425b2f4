use serde::Deserialize;
use std::collections::HashSet;

use crate::Config;
use crate::shared::{
    CheckpointConfig, DestinationConfig, PipelineConfig, SentryConfig, SourceConfig, TableConfig,
    ValidationError,
};

/// Complete configuration of the `merger` service.
///
/// This intentionally does not implement `Serialize` to avoid leaking the Sentry DSN.
#[derive(Debug, Clone, Deserialize)]
pub struct MergerConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub checkpoint: CheckpointConfig,
    pub tables: Vec<TableConfig>,
    /// Enables Sentry error reporting when present.
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
}

impl MergerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;

        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut names = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            table.validate()?;

            if !names.insert(table.name.as_str()) {
                return Err(ValidationError::DuplicateTable(table.name.clone()));
            }
        }

        Ok(())
    }
}

impl Config for MergerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
