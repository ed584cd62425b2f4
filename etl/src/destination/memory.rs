use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::destination::{Destination, TableSnapshot, UpsertSummary};
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{TableDefinition, TableRow};

/// In-memory destination for tests and development.
///
/// Each table is an [`Arc<TableSnapshot>`] that upserts replace in one step, so a reader holding a
/// snapshot keeps seeing it unchanged. Data is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    tables: Arc<RwLock<HashMap<String, Arc<TableSnapshot>>>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn ensure_table(&self, table: &TableDefinition) -> EtlResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.contains_key(table.name()) {
            info!(table = table.name(), "creating in-memory target table");
            tables.insert(table.name().to_owned(), Arc::new(TableSnapshot::default()));
        }

        Ok(())
    }

    async fn upsert(&self, table: &TableDefinition, rows: Vec<TableRow>) -> EtlResult<UpsertSummary> {
        let mut tables = self.tables.write().await;
        let current = tables.get(table.name()).ok_or_else(|| {
            etl_error!(
                ErrorKind::MissingTable,
                "Target table does not exist",
                format!("table '{}'", table.name())
            )
        })?;

        let (next, summary) = current.apply(table, rows);
        tables.insert(table.name().to_owned(), Arc::new(next));

        Ok(summary)
    }

    async fn read_snapshot(&self, table: &str) -> EtlResult<Arc<TableSnapshot>> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().ok_or_else(|| {
            etl_error!(
                ErrorKind::MissingTable,
                "Target table does not exist",
                format!("table '{table}'")
            )
        })
    }
}
