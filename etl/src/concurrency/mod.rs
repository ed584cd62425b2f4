//! Coordination primitives shared by the pipeline and its table workers.
//!
//! [`shutdown`] broadcasts a stop request to every worker, [`arrival`] lets an external collector
//! wake streaming workers as soon as a new unit lands.

pub mod arrival;
pub mod shutdown;
