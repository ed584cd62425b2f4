use serde::Deserialize;
use std::path::PathBuf;

/// Where merged tables are kept.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    /// Tables live in process memory and are lost on exit.
    Memory,
    /// Each table is a durable JSON document under `dir`.
    File { dir: PathBuf },
}
