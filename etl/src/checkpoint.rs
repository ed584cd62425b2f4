//! Per-table view of the checkpoint used by a running table worker.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::failpoints::{CHECKPOINT_BEFORE_PERSIST, etl_fail_point};
use crate::store::checkpoint::{Checkpoint, CheckpointStore};
use crate::types::{Batch, UnitId};

/// Tracks which units of one table are done and persists progress after each merge.
///
/// Units skipped for transient reasons are remembered only in memory, so a restarted pipeline
/// tries them again.
#[derive(Debug)]
pub struct CheckpointManager<C> {
    table: String,
    store: C,
    checkpoint: Checkpoint,
    transient_skips: HashSet<UnitId>,
}

impl<C> CheckpointManager<C>
where
    C: CheckpointStore,
{
    /// Loads the stored checkpoint of `table`.
    pub async fn load(table: impl Into<String>, store: C) -> EtlResult<Self> {
        let table = table.into();
        let checkpoint = store.load_checkpoint(&table).await?;

        info!(
            table = %table,
            processed = checkpoint.processed.len(),
            skipped = checkpoint.skipped.len(),
            next_batch_id = checkpoint.next_batch_id,
            "loaded checkpoint"
        );

        Ok(Self {
            table,
            store,
            checkpoint,
            transient_skips: HashSet::new(),
        })
    }

    /// Whether the unit must not be read again by this worker.
    pub fn is_done(&self, unit_id: &UnitId) -> bool {
        self.checkpoint.contains(unit_id) || self.transient_skips.contains(unit_id)
    }

    /// Sequence number for the next batch read from the table.
    pub fn next_batch_id(&self) -> u64 {
        self.checkpoint.next_batch_id
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Durably records that the merge of `batch` committed.
    ///
    /// Must only be called after the commit. Any failure is returned as
    /// [`ErrorKind::CheckpointWriteFailure`] and leaves the unit not done.
    pub async fn commit(&mut self, batch: &Batch) -> EtlResult<()> {
        etl_fail_point(CHECKPOINT_BEFORE_PERSIST).map_err(|err| self.write_failure(batch.unit_id(), err))?;

        self.store
            .mark_processed(&self.table, batch.unit_id(), batch.batch_id())
            .await
            .map_err(|err| self.write_failure(batch.unit_id(), err))?;

        self.checkpoint
            .record_processed(batch.unit_id().clone(), batch.batch_id());
        debug!(table = %self.table, unit_id = %batch.unit_id(), batch_id = batch.batch_id(), "checkpoint advanced");

        Ok(())
    }

    /// Records that `unit_id` is skipped because of an error of `kind`.
    ///
    /// With `persist` the skip is written to the store and survives restarts, otherwise it only
    /// lasts for this worker.
    pub async fn skip(&mut self, unit_id: &UnitId, kind: ErrorKind, persist: bool) -> EtlResult<()> {
        if !persist {
            self.transient_skips.insert(unit_id.clone());
            return Ok(());
        }

        self.store
            .mark_skipped(&self.table, unit_id, kind)
            .await
            .map_err(|err| self.write_failure(unit_id, err))?;
        self.checkpoint.record_skipped(unit_id.clone(), kind);

        Ok(())
    }

    fn write_failure(&self, unit_id: &UnitId, err: EtlError) -> EtlError {
        if err.kind() == ErrorKind::CheckpointWriteFailure {
            return err;
        }

        etl_error!(
            ErrorKind::CheckpointWriteFailure,
            "Failed to persist checkpoint",
            format!("table '{}', unit '{unit_id}'", self.table),
            source: err
        )
    }
}
