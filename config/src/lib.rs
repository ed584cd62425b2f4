//! Configuration for the merge pipeline and the `merger` service.
//!
//! Configuration is plain data: it is loaded once at startup via [`load_config`], validated, and
//! then passed explicitly to the components that need it.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
