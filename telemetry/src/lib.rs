//! Logging and metrics initialization shared by the workspace binaries and tests.

pub mod metrics;
pub mod tracing;
