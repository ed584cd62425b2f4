use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::{RawRecord, UnitSource};
use crate::types::UnitId;

/// Reads units from a directory tree laid out as `{root}/{table}/{unit}`.
///
/// Each unit is a file of newline-delimited JSON records. Files whose names start with `.` or `_`
/// are in-flight or marker files of the collector and are never listed.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }
}

fn is_unit_name(name: &str) -> bool {
    !name.starts_with('.') && !name.starts_with('_')
}

fn read_failure(path: &Path, err: io::Error) -> crate::error::EtlError {
    etl_error!(
        ErrorKind::ReadFailure,
        "Failed to access source unit",
        format!("{}: {err}", path.display()),
        source: err
    )
}

impl UnitSource for DirectorySource {
    async fn list_units(&self, table: &str) -> EtlResult<Vec<UnitId>> {
        let dir = self.table_dir(table);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // The collector creates the directory with its first unit.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(table, dir = %dir.display(), "source directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(read_failure(&dir, err)),
        };

        let mut units = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| read_failure(&dir, err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| read_failure(&entry.path(), err))?;
            if !file_type.is_file() {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_unit_name(&name) {
                units.push(UnitId::new(name));
            }
        }

        units.sort();
        Ok(units)
    }

    async fn read_unit(&self, table: &str, unit_id: &UnitId) -> EtlResult<Vec<RawRecord>> {
        let path = self.table_dir(table).join(unit_id.as_str());
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| read_failure(&path, err))?;

        let mut records = Vec::new();
        for (line_number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let record = serde_json::from_str(line).map_err(|err| {
                etl_error!(
                    ErrorKind::ReadFailure,
                    "Source unit contains invalid JSON",
                    format!("{}, line {}: {err}", path.display(), line_number + 1),
                    source: err
                )
            })?;
            records.push(record);
        }

        Ok(records)
    }
}
