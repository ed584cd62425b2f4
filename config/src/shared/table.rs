use serde::Deserialize;
use std::collections::HashSet;

use crate::shared::ValidationError;

/// Semantic type of a declared column.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInt,
    Float,
    Boolean,
    String,
    Timestamp,
}

/// One column of an inline table schema.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

/// A table merged by the pipeline.
#[derive(Clone, Debug, Deserialize)]
pub struct TableConfig {
    /// Name of the table; also the name of the source directory holding its units.
    pub name: String,
    /// Columns identifying the same logical row across updates.
    ///
    /// May be left empty for built-in tables, which then use their default key and recency
    /// column.
    #[serde(default)]
    pub key_columns: Vec<String>,
    /// Column deciding which of several records for a key is newest.
    ///
    /// When absent, the record arriving last in a unit wins.
    #[serde(default)]
    pub recency_column: Option<String>,
    /// Inline schema. When absent, the built-in declaration named [`TableConfig::name`] is used.
    #[serde(default)]
    pub schema: Option<Vec<ColumnConfig>>,
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "tables.name".to_string(),
                constraint: "cannot be empty".to_string(),
            });
        }

        if self.schema.is_some() && self.key_columns.is_empty() {
            return Err(ValidationError::EmptyKey(self.name.clone()));
        }

        if let Some(columns) = &self.schema {
            let mut seen = HashSet::with_capacity(columns.len());
            for column in columns {
                if !seen.insert(column.name.as_str()) {
                    return Err(ValidationError::DuplicateColumn {
                        table: self.name.clone(),
                        column: column.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn default_nullable() -> bool {
    true
}
