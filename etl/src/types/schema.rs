use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use config::shared::ColumnType;
use serde_json::{Map, Value};

use crate::types::{Cell, EntityKey, TableRow};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Integer,
    BigInt,
    Float,
    Boolean,
    String,
    Timestamp,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::BigInt => "bigint",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
        }
    }

    /// Converts a non-null JSON value into a [`Cell`] of this type.
    ///
    /// Returns [`None`] when the value cannot represent this type. Integers are accepted for
    /// float columns, nothing else is coerced.
    fn cell_from_json(&self, value: &Value) -> Option<Cell> {
        match self {
            SemanticType::Integer => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Cell::I32),
            SemanticType::BigInt => value.as_i64().map(Cell::I64),
            SemanticType::Float => value.as_f64().map(Cell::F64),
            SemanticType::Boolean => value.as_bool().map(Cell::Bool),
            SemanticType::String => value.as_str().map(|v| Cell::String(v.to_owned())),
            SemanticType::Timestamp => value
                .as_str()
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|v| Cell::TimestampTz(v.with_timezone(&Utc))),
        }
    }
}

impl From<ColumnType> for SemanticType {
    fn from(value: ColumnType) -> Self {
        match value {
            ColumnType::Integer => SemanticType::Integer,
            ColumnType::BigInt => SemanticType::BigInt,
            ColumnType::Float => SemanticType::Float,
            ColumnType::Boolean => SemanticType::Boolean,
            ColumnType::String => SemanticType::String,
            ColumnType::Timestamp => SemanticType::Timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: SemanticType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: SemanticType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable,
        }
    }
}

/// Reason a raw record was rejected by [`TableSchema::row_from_json`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAnObject,
    UnknownField(String),
    MissingField(String),
    NullInNonNullable(String),
    TypeMismatch {
        field: String,
        expected: SemanticType,
        found: String,
    },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::NotAnObject => write!(f, "record is not a JSON object"),
            SchemaViolation::UnknownField(field) => write!(f, "unknown field '{field}'"),
            SchemaViolation::MissingField(field) => write!(f, "missing field '{field}'"),
            SchemaViolation::NullInNonNullable(field) => {
                write!(f, "null value in non-nullable field '{field}'")
            }
            SchemaViolation::TypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "field '{field}' expected {} but found {found}",
                expected.as_str()
            ),
        }
    }
}

/// Ordered column layout of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Returns the position of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Validates a raw JSON record and converts it into a [`TableRow`].
    ///
    /// The record must be an object whose fields are all declared columns. Absent fields are
    /// read as null, which only nullable columns accept.
    pub fn row_from_json(&self, record: &Value) -> Result<TableRow, SchemaViolation> {
        let Value::Object(fields) = record else {
            return Err(SchemaViolation::NotAnObject);
        };

        if let Some(unknown) = fields.keys().find(|key| self.column_index(key).is_none()) {
            return Err(SchemaViolation::UnknownField(unknown.clone()));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let cell = match fields.get(&column.name) {
                None | Some(Value::Null) if column.nullable => Cell::Null,
                None => return Err(SchemaViolation::MissingField(column.name.clone())),
                Some(Value::Null) => {
                    return Err(SchemaViolation::NullInNonNullable(column.name.clone()));
                }
                Some(value) => column.typ.cell_from_json(value).ok_or_else(|| {
                    SchemaViolation::TypeMismatch {
                        field: column.name.clone(),
                        expected: column.typ,
                        found: json_type_name(value).to_owned(),
                    }
                })?,
            };
            values.push(cell);
        }

        Ok(TableRow::new(values))
    }

    /// Renders a row as a JSON object keyed by column name.
    pub fn row_to_json(&self, row: &TableRow) -> Value {
        let fields: Map<String, Value> = self
            .columns
            .iter()
            .zip(row.values())
            .map(|(column, cell)| (column.name.clone(), cell.to_json()))
            .collect();

        Value::Object(fields)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A target table: its schema, entity key columns and optional recency column.
///
/// Key and recency columns are stored as positions into [`TableSchema::columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    schema: Arc<TableSchema>,
    key_columns: Vec<usize>,
    recency_column: Option<usize>,
}

impl TableDefinition {
    pub fn new(
        schema: Arc<TableSchema>,
        key_columns: Vec<usize>,
        recency_column: Option<usize>,
    ) -> Self {
        Self {
            schema,
            key_columns,
            recency_column,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn key_columns(&self) -> &[usize] {
        &self.key_columns
    }

    pub fn recency_column(&self) -> Option<usize> {
        self.recency_column
    }

    pub fn entity_key(&self, row: &TableRow) -> EntityKey {
        EntityKey::from_row(row, &self.key_columns)
    }

    /// Returns the recency marker of `row`, or [`None`] when the table has no recency column.
    pub fn recency_of<'a>(&self, row: &'a TableRow) -> Option<&'a Cell> {
        self.recency_column.and_then(|index| row.get(index))
    }
}
