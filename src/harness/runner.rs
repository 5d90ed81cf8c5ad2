//! Scenario runner
//!
//! Loads a scenario file, launches the worker, executes the scenario and
//! prints a report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::stream::{cancel_pair, DuplexChannel, WorkerProcess};

use super::actions::{ActionOutcome, ActionRegistry};
use super::orchestrator::{Orchestrator, ScenarioReport};
use super::scenario::ScenarioDefinition;

/// Options for one `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub scenario: PathBuf,
    /// Worker executable; falls back to `[worker] program` in the config
    pub worker: Option<PathBuf>,
    /// Worker arguments; falls back to `[worker] args` when empty
    pub worker_args: Vec<String>,
    pub continue_on_failure: bool,
    pub verbose: bool,
}

/// Run a scenario file against a freshly started worker
pub async fn run_scenario(options: &RunOptions, config: &Config) -> Result<ScenarioReport> {
    let definition = ScenarioDefinition::load(&options.scenario)?;

    let (channel, endpoint) = DuplexChannel::new();
    let registry = ActionRegistry::with_defaults(Arc::new(channel), &config.timeouts);
    let scenario = definition.build(&registry)?;

    println!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let program = options
        .worker
        .clone()
        .or_else(|| config.worker.program.clone())
        .ok_or_else(|| {
            Error::Config(
                "No worker program. Pass --worker or set 'program' under [worker] in the config file"
                    .to_string(),
            )
        })?;
    let args = if options.worker_args.is_empty() {
        config.worker.args.clone()
    } else {
        options.worker_args.clone()
    };

    let worker = WorkerProcess::spawn(&program, &args, endpoint)?;
    if options.verbose {
        println!("  Worker: {}", program.display().to_string().dimmed());
    }

    let (cancel_handle, cancel) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling scenario");
            cancel_handle.cancel();
        }
    });

    let orchestrator =
        Orchestrator::new(options.continue_on_failure || config.run.continue_on_failure);
    let result = orchestrator.run(scenario, cancel).await;

    interrupt.abort();
    if let Err(e) = worker.shutdown().await {
        tracing::warn!("Failed to stop worker: {}", e);
    }

    let report = result?;
    print_report(&report, options.verbose);
    Ok(report)
}

/// Construct every action of a scenario without running anything
pub fn check_scenario(path: &Path, config: &Config) -> Result<usize> {
    let definition = ScenarioDefinition::load(path)?;
    let (channel, _endpoint) = DuplexChannel::new();
    let registry = ActionRegistry::with_defaults(Arc::new(channel), &config.timeouts);
    let scenario = definition.build(&registry)?;

    println!(
        "{} {} ({} actions)",
        "✓".green(),
        scenario.name.white().bold(),
        scenario.actions.len()
    );
    Ok(scenario.actions.len())
}

fn print_report(report: &ScenarioReport, verbose: bool) {
    println!("\n{}", "Actions:".cyan());

    for (i, result) in report.results.iter().enumerate() {
        let step = i + 1;
        let timing = format!("{}ms", result.elapsed.as_millis());
        match &result.outcome {
            ActionOutcome::Passed => {
                if verbose {
                    println!(
                        "  {} Action {}: {} [{}] {}",
                        "✓".green(),
                        step,
                        result.name,
                        result.action_type,
                        timing.dimmed()
                    );
                } else {
                    println!("  {} Action {}: {}", "✓".green(), step, result.name);
                }
            }
            ActionOutcome::Cancelled => {
                println!("  {} Action {}: {} cancelled", "!".yellow(), step, result.name);
            }
            outcome => {
                println!(
                    "  {} Action {}: {} {}",
                    "✗".red(),
                    step,
                    result.name,
                    timing.dimmed()
                );
                for line in outcome.to_string().lines() {
                    println!("      {}", line.red());
                }
            }
        }
    }

    for name in &report.skipped {
        println!("  {} {} (skipped)", "-".dimmed(), name.dimmed());
    }

    if report.passed() {
        println!(
            "\n{} {}\n",
            "✓".green().bold(),
            "Scenario Passed".green().bold()
        );
    } else {
        println!(
            "\n{} {} ({}/{} actions passed)\n",
            "✗".red().bold(),
            "Scenario Failed".red().bold(),
            report.passed_count(),
            report.total()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_check_scenario_counts_actions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "scenarioName: check\nactions:\n  - messages: [{{}}]\n  - {{type: delay, timeout: 5}}"
        )
        .unwrap();

        let count = check_scenario(file.path(), &Config::default()).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_check_scenario_reports_invalid_action() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scenarioName: check\nactions:\n  - {{messages: []}}").unwrap();

        let err = check_scenario(file.path(), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[tokio::test]
    async fn test_run_without_worker_program() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scenarioName: none\nactions: []").unwrap();

        let options = RunOptions {
            scenario: file.path().to_path_buf(),
            ..Default::default()
        };
        let err = run_scenario(&options, &Config::default()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
