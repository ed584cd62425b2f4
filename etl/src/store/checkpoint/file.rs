use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::fs::write_atomically;
use crate::store::checkpoint::{Checkpoint, CheckpointStore};
use crate::types::UnitId;

/// Checkpoint store writing one JSON file per table, `{dir}/{table}.checkpoint.json`.
///
/// Checkpoints are cached after the first load. An update is written durably first and only
/// then applied to the cache, so a failed write changes nothing.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    cache: Arc<Mutex<HashMap<String, Checkpoint>>>,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> EtlResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|err| {
            checkpoint_error(
                ErrorKind::CheckpointWriteFailure,
                "Failed to create checkpoint directory",
                &dir,
                err,
            )
        })?;

        Ok(Self {
            dir,
            cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn checkpoint_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.checkpoint.json"))
    }

    async fn read(&self, table: &str) -> EtlResult<Checkpoint> {
        let path = self.checkpoint_path(table);
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Checkpoint::default()),
            Err(err) => {
                return Err(checkpoint_error(
                    ErrorKind::CheckpointReadFailure,
                    "Failed to read checkpoint",
                    &path,
                    err,
                ));
            }
        };

        serde_json::from_slice(&contents).map_err(|err| {
            etl_error!(
                ErrorKind::CheckpointReadFailure,
                "Stored checkpoint is invalid",
                format!("{}: {err}", path.display()),
                source: err
            )
        })
    }

    /// Applies `update` to the table's checkpoint and persists the result.
    async fn update<F>(&self, table: &str, update: F) -> EtlResult<()>
    where
        F: FnOnce(&mut Checkpoint),
    {
        let mut cache = self.cache.lock().await;
        let mut checkpoint = match cache.get(table) {
            Some(checkpoint) => checkpoint.clone(),
            None => self.read(table).await?,
        };
        update(&mut checkpoint);

        let path = self.checkpoint_path(table);
        let contents = serde_json::to_vec_pretty(&checkpoint).map_err(|err| {
            etl_error!(
                ErrorKind::CheckpointWriteFailure,
                "Failed to serialize checkpoint",
                err,
                source: err
            )
        })?;
        write_atomically(&path, &contents).await.map_err(|err| {
            checkpoint_error(
                ErrorKind::CheckpointWriteFailure,
                "Failed to write checkpoint",
                &path,
                err,
            )
        })?;
        debug!(table, path = %path.display(), "persisted checkpoint");

        cache.insert(table.to_owned(), checkpoint);

        Ok(())
    }
}

fn checkpoint_error(kind: ErrorKind, description: &'static str, path: &Path, err: io::Error) -> EtlError {
    etl_error!(kind, description, format!("{}: {err}", path.display()), source: err)
}

impl CheckpointStore for FileCheckpointStore {
    async fn load_checkpoint(&self, table: &str) -> EtlResult<Checkpoint> {
        let mut cache = self.cache.lock().await;
        if let Some(checkpoint) = cache.get(table) {
            return Ok(checkpoint.clone());
        }

        let checkpoint = self.read(table).await?;
        cache.insert(table.to_owned(), checkpoint.clone());

        Ok(checkpoint)
    }

    async fn mark_processed(&self, table: &str, unit_id: &UnitId, batch_id: u64) -> EtlResult<()> {
        self.update(table, |checkpoint| {
            checkpoint.record_processed(unit_id.clone(), batch_id)
        })
        .await
    }

    async fn is_processed(&self, table: &str, unit_id: &UnitId) -> EtlResult<bool> {
        let checkpoint = self.load_checkpoint(table).await?;
        Ok(checkpoint.processed.contains(unit_id))
    }

    async fn mark_skipped(&self, table: &str, unit_id: &UnitId, kind: ErrorKind) -> EtlResult<()> {
        self.update(table, |checkpoint| {
            checkpoint.record_skipped(unit_id.clone(), kind)
        })
        .await
    }
}
