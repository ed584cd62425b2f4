//! Applies deduplicated batches to their target table.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::info;

use crate::destination::{Destination, UpsertSummary};
use crate::error::EtlResult;
use crate::failpoints::{MERGE_BEFORE_COMMIT, etl_fail_point};
use crate::metrics::{
    ETL_MERGE_DURATION_SECONDS, ETL_ROWS_INSERTED_TOTAL, ETL_ROWS_UPDATED_TOTAL, TABLE_NAME_LABEL,
};
use crate::types::{Batch, TableDefinition};

/// Rows inserted and replaced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub inserted: usize,
    pub updated: usize,
}

impl From<UpsertSummary> for MergeResult {
    fn from(summary: UpsertSummary) -> Self {
        Self {
            inserted: summary.inserted,
            updated: summary.updated,
        }
    }
}

/// Upserts deduplicated batches into one target table.
///
/// A merge either commits every row of the batch or none of them. Merging the same batch again
/// leaves the table as it was after the first merge.
#[derive(Debug, Clone)]
pub struct MergeEngine<D> {
    destination: D,
    table: Arc<TableDefinition>,
}

impl<D> MergeEngine<D>
where
    D: Destination,
{
    pub fn new(destination: D, table: Arc<TableDefinition>) -> Self {
        Self { destination, table }
    }

    /// Merges `batch`, which must hold at most one row per entity key.
    pub async fn merge(&self, batch: &Batch) -> EtlResult<MergeResult> {
        let table_name = self.table.name();
        let started = Instant::now();

        etl_fail_point(MERGE_BEFORE_COMMIT)?;
        let summary = self
            .destination
            .upsert(&self.table, batch.rows().to_vec())
            .await?;

        histogram!(ETL_MERGE_DURATION_SECONDS, TABLE_NAME_LABEL => table_name.to_owned())
            .record(started.elapsed().as_secs_f64());
        counter!(ETL_ROWS_INSERTED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
            .increment(summary.inserted as u64);
        counter!(ETL_ROWS_UPDATED_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
            .increment(summary.updated as u64);

        info!(
            table = table_name,
            unit_id = %batch.unit_id(),
            batch_id = batch.batch_id(),
            inserted = summary.inserted,
            updated = summary.updated,
            version = summary.version,
            "merged batch"
        );

        Ok(summary.into())
    }
}
