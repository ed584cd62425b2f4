use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::bail;
use crate::destination::{Destination, TableSnapshot, UpsertSummary};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::fs::write_atomically;
use crate::types::{TableDefinition, TableRow};

/// On-disk layout of a target table.
#[derive(Debug, Serialize, Deserialize)]
struct TableDocument {
    table: String,
    version: u64,
    columns: Vec<String>,
    rows: Vec<Value>,
}

/// Only the version of a [`TableDocument`], used for conflict detection.
#[derive(Debug, Deserialize)]
struct TableVersion {
    version: u64,
}

/// Destination persisting each table as a JSON document `{dir}/{table}.table.json`.
///
/// Every upsert rewrites the document through [`write_atomically`] with the version incremented.
/// Before writing, the version on disk is compared with the version this destination last
/// committed; a difference means another writer changed the table and the upsert fails with
/// [`ErrorKind::MergeConflict`] without touching it. The cached table is reloaded from disk at that
/// point, so retrying the upsert merges onto the other writer's rows.
#[derive(Debug, Clone)]
pub struct FileDestination {
    dir: PathBuf,
    tables: Arc<RwLock<HashMap<String, Arc<TableSnapshot>>>>,
    write_lock: Arc<Mutex<()>>,
}

impl FileDestination {
    /// Creates a destination rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> EtlResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| write_failure("Failed to create target directory", &dir, err))?;

        Ok(Self {
            dir,
            tables: Arc::new(RwLock::new(HashMap::new())),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.table.json"))
    }

    async fn load_document(&self, table: &TableDefinition, path: &Path) -> EtlResult<TableSnapshot> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|err| write_failure("Failed to read target table", path, err))?;
        let document: TableDocument = serde_json::from_slice(&contents)?;

        let schema = table.schema();
        let expected: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        if document.table != table.name() || document.columns != expected {
            bail!(
                ErrorKind::ConfigError,
                "Stored target table does not match the declared schema",
                format!(
                    "{}: stored table '{}' with columns {:?}, declared {:?}",
                    path.display(),
                    document.table,
                    document.columns,
                    expected
                )
            );
        }

        let mut rows = BTreeMap::new();
        for (index, value) in document.rows.iter().enumerate() {
            let row = schema.row_from_json(value).map_err(|violation| {
                etl_error!(
                    ErrorKind::DeserializationError,
                    "Stored target row is invalid",
                    format!("{}, row {}: {violation}", path.display(), index + 1)
                )
            })?;
            rows.insert(table.entity_key(&row), row);
        }

        Ok(TableSnapshot::new(document.version, rows))
    }

    async fn persist(&self, table: &TableDefinition, snapshot: &TableSnapshot) -> EtlResult<()> {
        let schema = table.schema();
        let document = TableDocument {
            table: table.name().to_owned(),
            version: snapshot.version(),
            columns: schema.columns.iter().map(|c| c.name.clone()).collect(),
            rows: snapshot.rows().map(|row| schema.row_to_json(row)).collect(),
        };
        let contents = serde_json::to_vec_pretty(&document)?;

        let path = self.table_path(table.name());
        write_atomically(&path, &contents)
            .await
            .map_err(|err| write_failure("Failed to write target table", &path, err))
    }

    /// Reads the committed version on disk, [`None`] when the document is gone.
    async fn stored_version(&self, path: &Path) -> EtlResult<Option<u64>> {
        match tokio::fs::read(path).await {
            Ok(contents) => {
                let header: TableVersion = serde_json::from_slice(&contents)?;
                Ok(Some(header.version))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(write_failure("Failed to read target table", path, err)),
        }
    }
}

fn write_failure(description: &'static str, path: &Path, err: io::Error) -> EtlError {
    etl_error!(
        ErrorKind::WriteFailure,
        description,
        format!("{}: {err}", path.display()),
        source: err
    )
}

impl Destination for FileDestination {
    fn name() -> &'static str {
        "file"
    }

    async fn ensure_table(&self, table: &TableDefinition) -> EtlResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.table_path(table.name());

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|err| write_failure("Failed to check target table", &path, err))?;

        let snapshot = if exists {
            let snapshot = self.load_document(table, &path).await?;
            info!(table = table.name(), version = snapshot.version(), rows = snapshot.len(), "loaded target table");
            snapshot
        } else {
            let snapshot = TableSnapshot::default();
            self.persist(table, &snapshot).await?;
            info!(table = table.name(), path = %path.display(), "created target table");
            snapshot
        };

        self.tables
            .write()
            .await
            .insert(table.name().to_owned(), Arc::new(snapshot));

        Ok(())
    }

    async fn upsert(&self, table: &TableDefinition, rows: Vec<TableRow>) -> EtlResult<UpsertSummary> {
        let _guard = self.write_lock.lock().await;

        let current = self.read_snapshot(table.name()).await?;
        let path = self.table_path(table.name());

        let stored = self.stored_version(&path).await?;
        if stored != Some(current.version()) {
            // The next attempt applies its rows on top of what the other writer committed.
            if stored.is_some() {
                let latest = self.load_document(table, &path).await?;
                self.tables
                    .write()
                    .await
                    .insert(table.name().to_owned(), Arc::new(latest));
            }

            bail!(
                ErrorKind::MergeConflict,
                "Target table was changed by another writer",
                format!(
                    "table '{}': expected version {}, found {}",
                    table.name(),
                    current.version(),
                    stored.map_or_else(|| "no table".to_owned(), |v| v.to_string())
                )
            );
        }

        let (next, summary) = current.apply(table, rows);
        if next.version() == current.version() {
            return Ok(summary);
        }

        self.persist(table, &next).await?;
        self.tables
            .write()
            .await
            .insert(table.name().to_owned(), Arc::new(next));

        Ok(summary)
    }

    async fn read_snapshot(&self, table: &str) -> EtlResult<Arc<TableSnapshot>> {
        let tables = self.tables.read().await;
        tables.get(table).cloned().ok_or_else(|| {
            etl_error!(
                ErrorKind::MissingTable,
                "Target table was not opened",
                format!("table '{table}'")
            )
        })
    }
}
