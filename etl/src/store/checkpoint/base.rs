use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, EtlResult};
use crate::types::UnitId;

/// Durable progress of one table.
///
/// A unit is in `processed` only after its merge committed. `next_batch_id` is the sequence
/// number the next unit read from the table receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed: BTreeSet<UnitId>,
    /// Units skipped after an unrecoverable error, with the error kind that caused it.
    #[serde(default)]
    pub skipped: BTreeMap<UnitId, String>,
    #[serde(default)]
    pub next_batch_id: u64,
}

impl Checkpoint {
    /// Whether the unit never needs to be read again.
    pub fn contains(&self, unit_id: &UnitId) -> bool {
        self.processed.contains(unit_id) || self.skipped.contains_key(unit_id)
    }

    /// Records a committed unit.
    pub fn record_processed(&mut self, unit_id: UnitId, batch_id: u64) {
        self.skipped.remove(&unit_id);
        self.processed.insert(unit_id);
        self.next_batch_id = self.next_batch_id.max(batch_id + 1);
    }

    pub fn record_skipped(&mut self, unit_id: UnitId, kind: ErrorKind) {
        self.skipped.insert(unit_id, kind.as_str().to_owned());
    }
}

/// Storage of [`Checkpoint`]s, one per table and pipeline.
///
/// Writes must be durable when they return; a failed write must leave the previous checkpoint
/// intact. Implementations report write problems as [`ErrorKind::CheckpointWriteFailure`].
pub trait CheckpointStore {
    /// Returns the stored checkpoint of `table`, empty when none exists.
    fn load_checkpoint(&self, table: &str) -> impl Future<Output = EtlResult<Checkpoint>> + Send;

    /// Durably marks `unit_id` as merged.
    fn mark_processed(
        &self,
        table: &str,
        unit_id: &UnitId,
        batch_id: u64,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns whether `unit_id` was marked as merged.
    fn is_processed(
        &self,
        table: &str,
        unit_id: &UnitId,
    ) -> impl Future<Output = EtlResult<bool>> + Send;

    /// Durably marks `unit_id` as skipped because of an error of `kind`.
    fn mark_skipped(
        &self,
        table: &str,
        unit_id: &UnitId,
        kind: ErrorKind,
    ) -> impl Future<Output = EtlResult<()>> + Send;
}
