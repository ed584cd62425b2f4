use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::types::{EntityKey, TableDefinition, TableRow};

/// Outcome of a committed upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Table version after the upsert.
    pub version: u64,
}

/// Immutable state of a target table at one version.
///
/// Rows are indexed by entity key, at most one row per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSnapshot {
    version: u64,
    rows: BTreeMap<EntityKey, TableRow>,
}

impl TableSnapshot {
    pub fn new(version: u64, rows: BTreeMap<EntityKey, TableRow>) -> Self {
        Self { version, rows }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&TableRow> {
        self.rows.get(key)
    }

    /// Iterates over rows in entity key order.
    pub fn rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.values()
    }

    /// Returns the snapshot following this one after upserting `rows`.
    ///
    /// An empty upsert returns an unchanged copy at the same version.
    pub fn apply(&self, table: &TableDefinition, rows: Vec<TableRow>) -> (TableSnapshot, UpsertSummary) {
        let mut summary = UpsertSummary {
            version: self.version,
            ..UpsertSummary::default()
        };
        if rows.is_empty() {
            return (self.clone(), summary);
        }

        let mut next = self.rows.clone();
        for row in rows {
            match next.entry(table.entity_key(&row)) {
                Entry::Vacant(entry) => {
                    entry.insert(row);
                    summary.inserted += 1;
                }
                Entry::Occupied(mut entry) => {
                    entry.insert(row);
                    summary.updated += 1;
                }
            }
        }

        summary.version = self.version + 1;
        (TableSnapshot::new(summary.version, next), summary)
    }
}
