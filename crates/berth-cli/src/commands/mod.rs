pub mod init;
pub mod render;
pub mod simulate;
pub mod validate;
pub mod watch;

use std::path::Path;

use anyhow::Context;
use berth_core::TopologyDescriptor;
use clap::ValueEnum;

/// Output format for `render` and `simulate`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Load and validate a topology file, naming it in any error.
pub fn load(path: &str) -> anyhow::Result<TopologyDescriptor> {
    TopologyDescriptor::load(Path::new(path)).with_context(|| format!("loading {path}"))
}
