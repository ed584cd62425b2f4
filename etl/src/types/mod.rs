//! Core value types flowing through the merge pipeline.
//!
//! Records read from the source are validated into [`TableRow`]s of typed [`Cell`]s, grouped into
//! a [`Batch`] per source unit and identified within a table by their [`EntityKey`].

mod batch;
mod cell;
mod key;
mod schema;
mod table_row;

pub use batch::*;
pub use cell::*;
pub use key::*;
pub use schema::*;
pub use table_row::*;
