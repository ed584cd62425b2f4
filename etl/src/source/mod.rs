//! Discovery and reading of source units.
//!
//! A [`UnitSource`] lists the units available for a table and returns their raw records. The
//! [`SourceWatcher`] turns listings into an ordered stream of units not yet processed.

mod base;
mod directory;
mod memory;
mod watcher;

pub use base::{RawRecord, UnitSource};
pub use directory::DirectorySource;
pub use memory::MemorySource;
pub use watcher::SourceWatcher;
