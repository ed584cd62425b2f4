use std::collections::BTreeMap;
use std::sync::Arc;

use config::shared::TableConfig;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::schema::builtin;
use crate::types::{ColumnSchema, TableDefinition, TableSchema};

/// Resolved definitions of every table the pipeline merges, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, Arc<TableDefinition>>,
}

impl SchemaRegistry {
    /// Resolves the configured tables.
    ///
    /// Fails with [`ErrorKind::ConfigError`] for a duplicate table, an unknown key or recency column
    /// or an empty key, and with [`ErrorKind::MissingTableSchema`] for a table that has neither an
    /// inline schema nor a built-in declaration.
    pub fn from_config(tables: &[TableConfig]) -> EtlResult<Self> {
        let mut registry = SchemaRegistry::default();

        for table in tables {
            let schema = match &table.schema {
                Some(columns) => TableSchema::new(
                    table.name.clone(),
                    columns
                        .iter()
                        .map(|c| ColumnSchema::new(c.name.clone(), c.column_type.into(), c.nullable))
                        .collect(),
                ),
                None => match builtin::lookup(&table.name) {
                    Some(schema) => schema,
                    None => bail!(
                        ErrorKind::MissingTableSchema,
                        "Table has no schema declaration",
                        format!(
                            "table '{}' has no inline schema and no built-in declaration",
                            table.name
                        )
                    ),
                },
            };

            let (key_columns, recency_column) = if table.key_columns.is_empty() {
                match builtin::defaults(&table.name) {
                    Some(defaults) => (
                        defaults
                            .key_columns
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>(),
                        table
                            .recency_column
                            .clone()
                            .or(defaults.recency_column.map(str::to_owned)),
                    ),
                    None => (Vec::new(), table.recency_column.clone()),
                }
            } else {
                (table.key_columns.clone(), table.recency_column.clone())
            };

            registry.register(schema, &key_columns, recency_column.as_deref())?;
        }

        Ok(registry)
    }

    /// Adds a table, resolving key and recency column names against its schema.
    pub fn register(
        &mut self,
        schema: TableSchema,
        key_columns: &[String],
        recency_column: Option<&str>,
    ) -> EtlResult<Arc<TableDefinition>> {
        if self.tables.contains_key(&schema.name) {
            bail!(
                ErrorKind::ConfigError,
                "Table is declared more than once",
                format!("table '{}'", schema.name)
            );
        }

        if key_columns.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Table has an empty entity key",
                format!("table '{}'", schema.name)
            );
        }

        let key_indices = key_columns
            .iter()
            .map(|column| {
                schema.column_index(column).ok_or_else(|| {
                    etl_error!(
                        ErrorKind::ConfigError,
                        "Key column is not declared in the table schema",
                        format!("table '{}', column '{column}'", schema.name)
                    )
                })
            })
            .collect::<EtlResult<Vec<_>>>()?;

        let recency_index = match recency_column {
            Some(column) => Some(schema.column_index(column).ok_or_else(|| {
                etl_error!(
                    ErrorKind::ConfigError,
                    "Recency column is not declared in the table schema",
                    format!("table '{}', column '{column}'", schema.name)
                )
            })?),
            None => None,
        };

        info!(
            table = %schema.name,
            columns = schema.columns.len(),
            key_columns = ?key_columns,
            recency_column = ?recency_column,
            "registered table schema"
        );

        let name = schema.name.clone();
        let definition = Arc::new(TableDefinition::new(
            Arc::new(schema),
            key_indices,
            recency_index,
        ));
        self.tables.insert(name, definition.clone());

        Ok(definition)
    }

    /// Returns the schema of `table`.
    pub fn get_schema(&self, table: &str) -> EtlResult<Arc<TableSchema>> {
        self.get_table(table)
            .map(|definition| definition.schema().clone())
    }

    /// Returns the full definition of `table`.
    pub fn get_table(&self, table: &str) -> EtlResult<Arc<TableDefinition>> {
        self.tables.get(table).cloned().ok_or_else(|| {
            etl_error!(
                ErrorKind::MissingTableSchema,
                "Table is not registered",
                format!("table '{table}'")
            )
        })
    }

    /// Iterates over the registered tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDefinition>> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
