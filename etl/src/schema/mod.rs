//! Table declarations known to the pipeline.
//!
//! The [`SchemaRegistry`] resolves each configured table to a [`crate::types::TableDefinition`],
//! either from an inline schema or from one of the built-in declarations in [`builtin`].

pub mod builtin;
mod registry;

pub use registry::SchemaRegistry;
