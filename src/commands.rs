//! CLI command definitions
//!
//! Defines the clap commands for the worker harness CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario against a worker process
    Run {
        /// Path to the YAML scenario file
        scenario: PathBuf,

        /// Worker executable (default: [worker] program from the config file)
        #[arg(long, short)]
        worker: Option<PathBuf>,

        /// Keep running after an action fails or times out
        #[arg(long)]
        continue_on_failure: bool,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Arguments to pass to the worker
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Validate a scenario file without starting a worker
    Check {
        /// Path to the YAML scenario file
        scenario: PathBuf,
    },
}

impl Commands {
    /// Whether debug logging was requested
    pub fn verbose(&self) -> bool {
        matches!(self, Self::Run { verbose: true, .. })
    }
}
