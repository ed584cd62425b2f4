use serde::Deserialize;
use std::path::PathBuf;

/// Location of the incoming units.
///
/// Units for table `t` are the files found directly under `{root_dir}/t/`.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    pub root_dir: PathBuf,
}
