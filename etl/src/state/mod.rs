//! Observable state of table workers.

pub mod table;
