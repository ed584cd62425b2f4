//! Reduces a batch to one record per entity key.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use metrics::counter;
use tracing::debug;

use crate::metrics::{ETL_RECORDS_DEDUPLICATED_TOTAL, TABLE_NAME_LABEL};
use crate::types::{Batch, TableDefinition, TableRow};

/// Keeps, for every entity key in `batch`, the record with the greatest recency marker.
///
/// Null markers rank below every value. Ties, and tables without a recency column, resolve to
/// the record that arrived last. Survivors keep their relative arrival order, so applying this
/// twice gives the same batch as applying it once. Runs in time linear in the batch size.
pub fn deduplicate(table: &TableDefinition, batch: Batch) -> Batch {
    let original_len = batch.len();
    let rows = batch.rows();

    let mut winners: HashMap<_, usize> = HashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match winners.entry(table.entity_key(row)) {
            Entry::Vacant(entry) => {
                entry.insert(index);
            }
            Entry::Occupied(mut entry) => {
                if supersedes(table, row, &rows[*entry.get()]) {
                    entry.insert(index);
                }
            }
        }
    }

    let mut keep = vec![false; rows.len()];
    for index in winners.into_values() {
        keep[index] = true;
    }

    let table_name = batch.table().to_owned();
    let unit_id = batch.unit_id().clone();
    let batch_id = batch.batch_id();
    let deduplicated: Vec<TableRow> = batch
        .into_rows()
        .into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();

    let dropped = original_len - deduplicated.len();
    if dropped > 0 {
        counter!(ETL_RECORDS_DEDUPLICATED_TOTAL, TABLE_NAME_LABEL => table_name.clone())
            .increment(dropped as u64);
    }
    debug!(table = %table_name, %unit_id, kept = deduplicated.len(), dropped, "deduplicated batch");

    Batch::new(table_name, unit_id, batch_id, deduplicated)
}

/// Whether `candidate`, arriving after `current`, replaces it.
fn supersedes(table: &TableDefinition, candidate: &TableRow, current: &TableRow) -> bool {
    match (table.recency_of(candidate), table.recency_of(current)) {
        (Some(candidate), Some(current)) => candidate.total_cmp(current).is_ge(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{Cell, ColumnSchema, SemanticType, TableSchema, UnitId};

    fn table(with_recency: bool) -> TableDefinition {
        let schema = TableSchema::new(
            "scores",
            vec![
                ColumnSchema::new("id", SemanticType::Integer, false),
                ColumnSchema::new("value", SemanticType::String, true),
                ColumnSchema::new("updated_at", SemanticType::String, true),
            ],
        );
        TableDefinition::new(Arc::new(schema), vec![0], with_recency.then_some(2))
    }

    fn row(id: i32, value: &str, updated_at: Option<&str>) -> TableRow {
        TableRow::new(vec![
            Cell::I32(id),
            Cell::String(value.to_owned()),
            updated_at.map_or(Cell::Null, |v| Cell::String(v.to_owned())),
        ])
    }

    fn batch(rows: Vec<TableRow>) -> Batch {
        Batch::new("scores", UnitId::new("u1"), 3, rows)
    }

    fn values(batch: &Batch) -> Vec<String> {
        batch
            .rows()
            .iter()
            .map(|row| match row.get(1) {
                Some(Cell::String(value)) => value.clone(),
                other => panic!("unexpected value {other:?}"),
            })
            .collect()
    }

    #[test]
    fn keeps_greatest_recency_per_key() {
        let table = table(true);
        let result = deduplicate(
            &table,
            batch(vec![
                row(1, "new", Some("2024-01-02")),
                row(1, "old", Some("2024-01-01")),
                row(2, "only", Some("2024-01-01")),
            ]),
        );

        assert_eq!(values(&result), vec!["new", "only"]);
        assert_eq!(result.batch_id(), 3);
    }

    #[test]
    fn ties_resolve_to_last_arrival() {
        let table = table(true);
        let result = deduplicate(
            &table,
            batch(vec![
                row(1, "first", Some("2024-01-01")),
                row(1, "second", Some("2024-01-01")),
            ]),
        );

        assert_eq!(values(&result), vec!["second"]);
    }

    #[test]
    fn null_recency_ranks_lowest() {
        let table = table(true);
        let result = deduplicate(
            &table,
            batch(vec![
                row(1, "dated", Some("2024-01-01")),
                row(1, "undated", None),
                row(2, "undated-a", None),
                row(2, "undated-b", None),
            ]),
        );

        assert_eq!(values(&result), vec!["dated", "undated-b"]);
    }

    #[test]
    fn without_recency_column_last_arrival_wins() {
        let table = table(false);
        let result = deduplicate(
            &table,
            batch(vec![
                row(1, "a", Some("2024-01-09")),
                row(2, "b", None),
                row(1, "c", Some("2024-01-01")),
            ]),
        );

        assert_eq!(values(&result), vec!["b", "c"]);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let table = table(true);
        let once = deduplicate(
            &table,
            batch(vec![
                row(3, "x", Some("2024-01-01")),
                row(1, "y", Some("2024-01-03")),
                row(3, "z", Some("2024-01-02")),
                row(1, "w", Some("2024-01-01")),
            ]),
        );
        let twice = deduplicate(&table, once.clone());

        assert_eq!(once, twice);
        assert_eq!(values(&once), vec!["y", "z"]);
    }

    #[test]
    fn empty_batch_stays_empty() {
        let result = deduplicate(&table(true), batch(vec![]));

        assert!(result.is_empty());
    }
}
