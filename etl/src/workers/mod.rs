//! Background workers of the merge pipeline.

pub mod base;
pub mod policy;
pub mod table;
