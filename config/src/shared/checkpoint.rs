use serde::Deserialize;
use std::path::PathBuf;

/// Where per-table checkpoints are kept.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointConfig {
    /// Checkpoints live in process memory; every restart replays all units.
    Memory,
    /// Each table's checkpoint is a durable JSON document under `dir`.
    File { dir: PathBuf },
}
