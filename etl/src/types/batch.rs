use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::TableRow;

/// Identifier of a source unit, such as a file name within a table's source directory.
///
/// Unit ids order lexicographically, which is also the order in which a listing is emitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for UnitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The validated records of one source unit, in arrival order.
///
/// `batch_id` is a per-table sequence number assigned when the unit is read.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    table: String,
    unit_id: UnitId,
    batch_id: u64,
    rows: Vec<TableRow>,
}

impl Batch {
    pub fn new(table: impl Into<String>, unit_id: UnitId, batch_id: u64, rows: Vec<TableRow>) -> Self {
        Self {
            table: table.into(),
            unit_id,
            batch_id,
            rows,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<TableRow> {
        self.rows
    }
}
