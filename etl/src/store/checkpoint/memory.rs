use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, EtlResult};
use crate::store::checkpoint::{Checkpoint, CheckpointStore};
use crate::types::UnitId;

/// Checkpoint store kept in memory, for tests and single-run pipelines.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load_checkpoint(&self, table: &str) -> EtlResult<Checkpoint> {
        let checkpoints = self.checkpoints.lock().await;
        Ok(checkpoints.get(table).cloned().unwrap_or_default())
    }

    async fn mark_processed(&self, table: &str, unit_id: &UnitId, batch_id: u64) -> EtlResult<()> {
        let mut checkpoints = self.checkpoints.lock().await;
        checkpoints
            .entry(table.to_owned())
            .or_default()
            .record_processed(unit_id.clone(), batch_id);

        Ok(())
    }

    async fn is_processed(&self, table: &str, unit_id: &UnitId) -> EtlResult<bool> {
        let checkpoints = self.checkpoints.lock().await;
        Ok(checkpoints
            .get(table)
            .is_some_and(|checkpoint| checkpoint.processed.contains(unit_id)))
    }

    async fn mark_skipped(&self, table: &str, unit_id: &UnitId, kind: ErrorKind) -> EtlResult<()> {
        let mut checkpoints = self.checkpoints.lock().await;
        checkpoints
            .entry(table.to_owned())
            .or_default()
            .record_skipped(unit_id.clone(), kind);

        Ok(())
    }
}
