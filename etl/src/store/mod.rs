//! Persistent pipeline state.

pub mod checkpoint;
