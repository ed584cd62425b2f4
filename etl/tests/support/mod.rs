#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use config::shared::{PipelineConfig, PipelineMode, RetryConfig};
use etl::destination::{Destination, TableSnapshot, UpsertSummary};
use etl::error::{ErrorKind, EtlError, EtlResult};
use etl::schema::{SchemaRegistry, builtin};
use etl::state::table::PipelinePhase;
use etl::store::checkpoint::{Checkpoint, CheckpointStore};
use etl::types::{Cell, EntityKey, TableDefinition, TableRow, UnitId};
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};

pub const LEADERBOARDS: &str = builtin::LEADERBOARDS_TABLE;
pub const MAPS: &str = builtin::MAPS_TABLE;

/// Pipeline configuration with retries short enough for tests.
pub fn pipeline_config(mode: PipelineMode) -> PipelineConfig {
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_factor: 2.0,
    };

    PipelineConfig {
        id: 1,
        mode,
        poll_interval_ms: 20,
        read_retry: retry.clone(),
        merge_retry: retry,
    }
}

/// Registry holding both built-in tables with their default keys.
pub fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::default();
    registry
        .register(
            builtin::leaderboards(),
            &["GameId".to_owned()],
            Some("UpdatedUtc"),
        )
        .unwrap();
    registry
        .register(builtin::maps(), &["Number".to_owned()], None)
        .unwrap();

    registry
}

/// Registry holding only the maps table.
pub fn maps_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::default();
    registry
        .register(builtin::maps(), &["Number".to_owned()], None)
        .unwrap();

    registry
}

pub fn leaderboard_record(game_id: i32, updated_utc: Option<&str>, kills: f64) -> Value {
    json!({
        "PlayerId": 7,
        "TeamId": 1,
        "Name": "s1mple",
        "MatchName": "NAVI vs G2",
        "Team": "NAVI",
        "IsClosed": false,
        "GameId": game_id,
        "OpponentId": 2,
        "Opponent": "G2",
        "UpdatedUtc": updated_utc,
        "Kills": kills,
    })
}

pub fn map_record(number: i32, status: &str) -> Value {
    json!({
        "Number": number,
        "Name": "Mirage",
        "Status": status,
    })
}

/// Returns the value of `column` in the row keyed by the single integer `key`.
pub fn cell_of(snapshot: &TableSnapshot, table: &TableDefinition, key: i32, column: &str) -> Cell {
    let index = table.schema().column_index(column).unwrap();
    let row = snapshot
        .get(&EntityKey::new(vec![Cell::I32(key)]))
        .unwrap_or_else(|| panic!("no row with key {key}"));

    row.get(index).cloned().unwrap()
}

/// Waits until the phase published by a table worker matches `predicate`.
pub async fn wait_for_phase<F>(rx: &mut watch::Receiver<PipelinePhase>, predicate: F) -> PipelinePhase
where
    F: FnMut(&PipelinePhase) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for phase")
        .expect("table worker dropped its phase sender")
        .clone()
}

/// Polls `destination` until `table` holds `rows` rows.
pub async fn wait_for_rows<D: Destination>(destination: &D, table: &str, rows: usize) -> Arc<TableSnapshot> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(snapshot) = destination.read_snapshot(table).await
                && snapshot.len() >= rows
            {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for rows")
}

#[derive(Debug, Default)]
struct Faults {
    remaining: HashMap<String, (u32, ErrorKind)>,
    attempts: HashMap<String, u32>,
}

/// Destination that fails a configured number of upserts before delegating to `inner`.
#[derive(Debug, Clone)]
pub struct FaultyDestination<D> {
    inner: D,
    faults: Arc<Mutex<Faults>>,
}

impl<D> FaultyDestination<D> {
    pub fn wrap(inner: D) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Makes the next `times` upserts into `table` fail with `kind`.
    pub async fn fail_next_upserts(&self, table: &str, times: u32, kind: ErrorKind) {
        let mut faults = self.faults.lock().await;
        faults.remaining.insert(table.to_owned(), (times, kind));
    }

    /// Returns how many upserts into `table` were attempted, failed ones included.
    pub async fn upsert_attempts(&self, table: &str) -> u32 {
        let faults = self.faults.lock().await;
        faults.attempts.get(table).copied().unwrap_or(0)
    }
}

impl<D> Destination for FaultyDestination<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        "faulty"
    }

    async fn ensure_table(&self, table: &TableDefinition) -> EtlResult<()> {
        self.inner.ensure_table(table).await
    }

    async fn upsert(&self, table: &TableDefinition, rows: Vec<TableRow>) -> EtlResult<UpsertSummary> {
        {
            let mut faults = self.faults.lock().await;
            *faults.attempts.entry(table.name().to_owned()).or_default() += 1;

            if let Some((remaining, kind)) = faults.remaining.get_mut(table.name())
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(EtlError::from((*kind, "Injected upsert failure")));
            }
        }

        self.inner.upsert(table, rows).await
    }

    async fn read_snapshot(&self, table: &str) -> EtlResult<Arc<TableSnapshot>> {
        self.inner.read_snapshot(table).await
    }
}

/// Checkpoint store that fails a configured number of `mark_processed` calls.
#[derive(Debug, Clone)]
pub struct FaultyCheckpointStore<C> {
    inner: C,
    failures: Arc<Mutex<u32>>,
}

impl<C> FaultyCheckpointStore<C> {
    pub fn wrap(inner: C, failures: u32) -> Self {
        Self {
            inner,
            failures: Arc::new(Mutex::new(failures)),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> CheckpointStore for FaultyCheckpointStore<C>
where
    C: CheckpointStore + Send + Sync,
{
    async fn load_checkpoint(&self, table: &str) -> EtlResult<Checkpoint> {
        self.inner.load_checkpoint(table).await
    }

    async fn mark_processed(&self, table: &str, unit_id: &UnitId, batch_id: u64) -> EtlResult<()> {
        {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(EtlError::from((
                    ErrorKind::CheckpointWriteFailure,
                    "Injected checkpoint write failure",
                )));
            }
        }

        self.inner.mark_processed(table, unit_id, batch_id).await
    }

    async fn is_processed(&self, table: &str, unit_id: &UnitId) -> EtlResult<bool> {
        self.inner.is_processed(table, unit_id).await
    }

    async fn mark_skipped(&self, table: &str, unit_id: &UnitId, kind: ErrorKind) -> EtlResult<()> {
        self.inner.mark_skipped(table, unit_id, kind).await
    }
}
