use std::fmt;

use crate::types::{Cell, TableRow};

/// Identity of a logical entity within a table: the ordered values of its key columns.
///
/// Two rows with equal keys describe the same entity and the later one replaces the earlier one
/// in full.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    values: Vec<Cell>,
}

impl EntityKey {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Extracts the key from `row` using the given column positions.
    ///
    /// Positions come from a validated table definition, a missing column yields [`Cell::Null`].
    pub fn from_row(row: &TableRow, key_columns: &[usize]) -> Self {
        let values = key_columns
            .iter()
            .map(|&index| row.get(index).cloned().unwrap_or(Cell::Null))
            .collect();

        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value.to_json())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equal_key_values_are_the_same_entity() {
        let a = TableRow::new(vec![Cell::I32(1), Cell::String("x".to_owned()), Cell::I64(9)]);
        let b = TableRow::new(vec![Cell::I32(1), Cell::String("y".to_owned()), Cell::I64(9)]);

        let keys: HashSet<_> = [a, b]
            .iter()
            .map(|row| EntityKey::from_row(row, &[0, 2]))
            .collect();

        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn display_lists_values() {
        let key = EntityKey::new(vec![Cell::I32(1), Cell::String("x".to_owned())]);

        assert_eq!(key.to_string(), "(1, \"x\")");
    }
}
