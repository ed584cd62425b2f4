//! Incremental merge pipeline for append-only sources.
//!
//! Upstream collectors drop units of JSON records per table. For every table a worker discovers
//! new units, validates them into a [`types::Batch`], keeps the newest record per entity key and
//! upserts the result into the target table, then records the unit in a durable checkpoint. The
//! checkpoint only moves after the merge committed, and the merge is idempotent, so a unit
//! replayed after a crash leaves the target table as a single application would.
//!
//! ```text
//! SourceWatcher -> BatchReader -> deduplicate -> MergeEngine -> CheckpointManager
//! ```

pub mod checkpoint;
pub mod concurrency;
pub mod dedup;
pub mod destination;
pub mod error;
pub mod failpoints;
mod fs;
mod macros;
pub mod merge;
pub mod metrics;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod source;
pub mod state;
pub mod store;
pub mod types;
pub mod workers;
