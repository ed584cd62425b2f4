use crate::types::Cell;

/// A validated record, with one [`Cell`] per column in table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in table column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value of the column at `index`.
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}
