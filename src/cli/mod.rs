//! CLI command handling
//!
//! Dispatches CLI commands to the scenario runner.

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::harness::{check_scenario, run_scenario, RunOptions};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when a scenario ran but did not pass.
pub async fn dispatch(command: Commands) -> Result<bool> {
    let config = Config::load()?;

    match command {
        Commands::Run {
            scenario,
            worker,
            continue_on_failure,
            verbose,
            args,
        } => {
            let options = RunOptions {
                scenario,
                worker,
                worker_args: args,
                continue_on_failure,
                verbose,
            };
            let report = run_scenario(&options, &config).await?;
            Ok(report.passed())
        }

        Commands::Check { scenario } => {
            check_scenario(&scenario, &config)?;
            Ok(true)
        }
    }
}
