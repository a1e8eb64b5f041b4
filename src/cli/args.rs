//! CLI argument definitions using clap
//!
//! Commands:
//! - cnode-state-machine start --config <path>
//! - cnode-state-machine check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Content Node state monitoring and reconciliation
#[derive(Parser, Debug)]
#[command(name = "cnode-state-machine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Boot the state machine and enqueue jobs read from stdin, one JSON
    /// object per line: {"jobName": "...", "data": {...}}
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./cnode-state-machine.json")]
        config: PathBuf,

        /// How long to let queued work drain after stdin closes
        #[arg(long, default_value_t = 60)]
        drain_timeout_secs: u64,
    },

    /// Validate a configuration file and print it resolved, as JSON
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./cnode-state-machine.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
