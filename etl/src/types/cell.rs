use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// A single typed value of a row.
///
/// Cells are totally ordered through [`Cell::total_cmp`]: [`Cell::Null`] sorts below every other
/// value, floats compare with [`f64::total_cmp`] and strings compare lexicographically. Equality
/// and hashing agree with that order, which lets cells act as entity key components.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    TimestampTz(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Compares two cells under the total order used for recency markers and key ordering.
    ///
    /// Cells of different variants, which a validated table never mixes within a column, are
    /// ordered by variant so the order stays total.
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Null, Cell::Null) => Ordering::Equal,
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (Cell::I32(a), Cell::I32(b)) => a.cmp(b),
            (Cell::I64(a), Cell::I64(b)) => a.cmp(b),
            (Cell::F64(a), Cell::F64(b)) => a.total_cmp(b),
            (Cell::String(a), Cell::String(b)) => a.cmp(b),
            (Cell::TimestampTz(a), Cell::TimestampTz(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Renders the cell as JSON, timestamps as RFC 3339 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(value) => Value::Bool(*value),
            Cell::I32(value) => Value::from(*value),
            Cell::I64(value) => Value::from(*value),
            Cell::F64(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::String(value) => Value::String(value.clone()),
            Cell::TimestampTz(value) => {
                Value::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Bool(_) => 1,
            Cell::I32(_) => 2,
            Cell::I64(_) => 3,
            Cell::F64(_) => 4,
            Cell::String(_) => 5,
            Cell::TimestampTz(_) => 6,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Cell::Null => {}
            Cell::Bool(value) => value.hash(state),
            Cell::I32(value) => value.hash(state),
            Cell::I64(value) => value.hash(state),
            // Bit equality matches `f64::total_cmp` equality.
            Cell::F64(value) => value.to_bits().hash(state),
            Cell::String(value) => value.hash(state),
            Cell::TimestampTz(value) => value.hash(state),
        }
    }
}
