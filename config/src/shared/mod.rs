//! Shared configuration types for merge pipelines.

mod base;
mod checkpoint;
mod destination;
mod merger;
mod pipeline;
mod retry;
mod sentry;
mod source;
mod table;

pub use base::ValidationError;
pub use checkpoint::CheckpointConfig;
pub use destination::DestinationConfig;
pub use merger::MergerConfig;
pub use pipeline::{PipelineConfig, PipelineMode};
pub use retry::RetryConfig;
pub use sentry::SentryConfig;
pub use source::SourceConfig;
pub use table::{ColumnConfig, ColumnType, TableConfig};
