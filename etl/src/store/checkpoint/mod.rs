//! Storage of per-table progress: which units were merged or skipped.

mod base;
pub mod file;
pub mod memory;

pub use base::{Checkpoint, CheckpointStore};
