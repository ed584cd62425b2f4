use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::source::{RawRecord, UnitSource};
use crate::types::UnitId;

#[derive(Debug, Default)]
struct Inner {
    units: HashMap<String, BTreeMap<UnitId, Vec<RawRecord>>>,
    /// Remaining injected read failures per unit.
    read_failures: HashMap<(String, UnitId), u32>,
    reads: HashMap<(String, UnitId), u32>,
}

/// In-memory unit source for tests and embedding.
///
/// Units are added with [`MemorySource::add_unit`] and can be made to fail their next reads with
/// [`MemorySource::fail_reads`].
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a unit available for `table`. Adding an existing unit replaces its records.
    pub async fn add_unit(
        &self,
        table: &str,
        unit_id: impl Into<UnitId>,
        records: Vec<RawRecord>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .units
            .entry(table.to_owned())
            .or_default()
            .insert(unit_id.into(), records);
    }

    /// Makes the next `times` reads of a unit fail with [`ErrorKind::ReadFailure`].
    pub async fn fail_reads(&self, table: &str, unit_id: impl Into<UnitId>, times: u32) {
        let mut inner = self.inner.lock().await;
        inner
            .read_failures
            .insert((table.to_owned(), unit_id.into()), times);
    }

    /// Returns how many times a unit was read, failed attempts included.
    pub async fn read_count(&self, table: &str, unit_id: impl Into<UnitId>) -> u32 {
        let inner = self.inner.lock().await;
        inner
            .reads
            .get(&(table.to_owned(), unit_id.into()))
            .copied()
            .unwrap_or(0)
    }
}

impl UnitSource for MemorySource {
    async fn list_units(&self, table: &str) -> EtlResult<Vec<UnitId>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .units
            .get(table)
            .map(|units| units.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read_unit(&self, table: &str, unit_id: &UnitId) -> EtlResult<Vec<RawRecord>> {
        let mut inner = self.inner.lock().await;
        let key = (table.to_owned(), unit_id.clone());

        *inner.reads.entry(key.clone()).or_default() += 1;

        if let Some(remaining) = inner.read_failures.get_mut(&key)
            && *remaining > 0
        {
            *remaining -= 1;
            debug!(table, %unit_id, remaining = *remaining, "injected read failure");
            bail!(
                ErrorKind::ReadFailure,
                "Injected read failure",
                format!("table '{table}', unit '{unit_id}'")
            );
        }

        match inner.units.get(table).and_then(|units| units.get(unit_id)) {
            Some(records) => Ok(records.clone()),
            None => bail!(
                ErrorKind::ReadFailure,
                "Source unit does not exist",
                format!("table '{table}', unit '{unit_id}'")
            ),
        }
    }
}
