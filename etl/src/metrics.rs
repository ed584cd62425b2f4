//! Metric names and labels emitted by the merge pipeline.

/// Label for table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter of units merged and checkpointed.
pub const ETL_UNITS_PROCESSED_TOTAL: &str = "etl_units_processed_total";

/// Counter of units skipped after an unrecoverable unit-level error.
pub const ETL_UNITS_SKIPPED_TOTAL: &str = "etl_units_skipped_total";

/// Counter of raw records read from source units.
pub const ETL_RECORDS_READ_TOTAL: &str = "etl_records_read_total";

/// Counter of records dropped because a newer record for the same key was in the batch.
pub const ETL_RECORDS_DEDUPLICATED_TOTAL: &str = "etl_records_deduplicated_total";

/// Counter of rows inserted into target tables.
pub const ETL_ROWS_INSERTED_TOTAL: &str = "etl_rows_inserted_total";

/// Counter of rows replaced in target tables.
pub const ETL_ROWS_UPDATED_TOTAL: &str = "etl_rows_updated_total";

/// Histogram of merge commit durations in seconds.
pub const ETL_MERGE_DURATION_SECONDS: &str = "etl_merge_duration_seconds";

/// Counter of merge attempts that failed and were retried.
pub const ETL_MERGE_RETRIES_TOTAL: &str = "etl_merge_retries_total";
