use std::future::Future;
use std::sync::Arc;

use crate::destination::{TableSnapshot, UpsertSummary};
use crate::error::EtlResult;
use crate::types::{TableDefinition, TableRow};

/// Storage holding the merged state of target tables.
///
/// Upserts must be atomic and idempotent: applying the same rows twice leaves the same table
/// as applying them once, and a failed upsert leaves the table unchanged. Each table has a single
/// writer, its table worker.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Creates the table empty if it does not exist yet, otherwise loads it.
    fn ensure_table(&self, table: &TableDefinition) -> impl Future<Output = EtlResult<()>> + Send;

    /// Inserts rows whose key is absent and replaces in full rows whose key is present.
    ///
    /// `rows` must hold at most one row per entity key of `table`.
    fn upsert(
        &self,
        table: &TableDefinition,
        rows: Vec<TableRow>,
    ) -> impl Future<Output = EtlResult<UpsertSummary>> + Send;

    /// Returns the current committed snapshot of `table`.
    fn read_snapshot(
        &self,
        table: &str,
    ) -> impl Future<Output = EtlResult<Arc<TableSnapshot>>> + Send;

    /// Releases resources on pipeline shutdown. The default implementation does nothing.
    fn shutdown(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }
}
