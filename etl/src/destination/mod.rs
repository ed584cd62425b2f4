//! Target tables receiving merged rows.
//!
//! A [`Destination`] holds one snapshot per table and replaces it atomically on every upsert, so
//! readers observe either the state before a merge or the state after it.

mod base;
pub mod file;
pub mod memory;
mod snapshot;

pub use base::Destination;
pub use snapshot::{TableSnapshot, UpsertSummary};
