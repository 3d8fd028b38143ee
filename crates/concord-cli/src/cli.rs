use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "concord",
    about = "Distributed cluster membership coordinator",
    version
)]
pub struct Cli {
    /// Path to the coordinator config file (YAML). If omitted, the config is
    /// built entirely from `CONCORD_*` environment variables.
    #[arg(long, env = "CONCORD_CONFIG")]
    pub config: Option<PathBuf>,

    /// KV path this node's cluster view lives under.
    #[arg(long, default_value = "concord/demo")]
    pub key: String,
}
