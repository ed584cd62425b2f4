//! Reads one unit and validates its records against the table schema.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::metrics::{ETL_RECORDS_READ_TOTAL, TABLE_NAME_LABEL};
use crate::source::UnitSource;
use crate::types::{Batch, TableDefinition, UnitId};

/// Turns a source unit into a [`Batch`] of validated rows.
#[derive(Debug, Clone)]
pub struct BatchReader<S> {
    source: S,
    table: Arc<TableDefinition>,
}

impl<S> BatchReader<S>
where
    S: UnitSource,
{
    pub fn new(source: S, table: Arc<TableDefinition>) -> Self {
        Self { source, table }
    }

    /// Reads `unit_id` and validates every record, keeping arrival order.
    ///
    /// A single invalid record rejects the whole unit with [`ErrorKind::SchemaMismatch`]; source
    /// errors are returned as reported by the source.
    pub async fn read(&self, unit_id: &UnitId, batch_id: u64) -> EtlResult<Batch> {
        let table_name = self.table.name();
        let records = self.source.read_unit(table_name, unit_id).await?;

        counter!(ETL_RECORDS_READ_TOTAL, TABLE_NAME_LABEL => table_name.to_owned())
            .increment(records.len() as u64);

        let schema = self.table.schema();
        let rows = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                schema.row_from_json(record).map_err(|violation| {
                    etl_error!(
                        ErrorKind::SchemaMismatch,
                        "Record does not match the table schema",
                        format!(
                            "table '{table_name}', unit '{unit_id}', record {}: {violation}",
                            index + 1
                        )
                    )
                })
            })
            .collect::<EtlResult<Vec<_>>>()?;

        debug!(table = table_name, %unit_id, batch_id, rows = rows.len(), "read batch");

        Ok(Batch::new(table_name, unit_id.clone(), batch_id, rows))
    }
}
