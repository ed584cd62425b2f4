use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// No table has been configured.
    #[error("at least one table must be configured")]
    NoTables,
    /// The same table name appears more than once.
    #[error("table `{0}` is configured more than once")]
    DuplicateTable(String),
    /// A table has no entity key columns.
    #[error("table `{0}` must declare at least one key column")]
    EmptyKey(String),
    /// An inline schema declares the same column twice.
    #[error("table `{table}` declares column `{column}` more than once")]
    DuplicateColumn { table: String, column: String },
}
