//! Sequential scenario execution

use std::time::{Duration, Instant};

use crate::common::Result;
use crate::stream::CancelSignal;

use super::actions::{ActionOutcome, ActionType, ExecutionContext};
use super::scenario::Scenario;

/// Result of one executed action
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub name: String,
    pub action_type: ActionType,
    pub outcome: ActionOutcome,
    pub elapsed: Duration,
}

/// Result of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub results: Vec<ActionResult>,
    /// Actions never started because an earlier one stopped the run
    pub skipped: Vec<String>,
}

impl ScenarioReport {
    /// True when every action ran and passed
    pub fn passed(&self) -> bool {
        self.skipped.is_empty() && self.results.iter().all(|r| r.outcome.is_passed())
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.skipped.len()
    }
}

/// Runs a scenario's actions in declaration order
#[derive(Debug, Default, Clone, Copy)]
pub struct Orchestrator {
    continue_on_failure: bool,
}

impl Orchestrator {
    pub fn new(continue_on_failure: bool) -> Self {
        Self { continue_on_failure }
    }

    /// Run every action in order
    ///
    /// A failed or timed-out action stops the run unless
    /// `continue_on_failure` is set here or in the scenario. Cancellation
    /// always stops it.
    pub async fn run(&self, scenario: Scenario, cancel: CancelSignal) -> Result<ScenarioReport> {
        let continue_on_failure = self.continue_on_failure || scenario.continue_on_failure;
        let mut ctx = ExecutionContext::new(scenario.variables, cancel);
        let mut results = Vec::with_capacity(scenario.actions.len());
        let mut actions = scenario.actions.into_iter();

        tracing::info!(scenario = %scenario.name, "Starting scenario");

        for mut action in actions.by_ref() {
            let started = Instant::now();
            let outcome = action.run(&mut ctx).await?;
            let elapsed = started.elapsed();

            if outcome.is_passed() {
                tracing::info!(action = %action.name(), elapsed_ms = elapsed.as_millis() as u64, "Action passed");
            } else {
                tracing::warn!(action = %action.name(), outcome = %outcome, "Action did not pass");
            }

            let stop = match &outcome {
                ActionOutcome::Passed => false,
                ActionOutcome::Cancelled => true,
                ActionOutcome::Failed(_) | ActionOutcome::TimedOut(_) => !continue_on_failure,
            };

            results.push(ActionResult {
                name: action.name().to_string(),
                action_type: action.action_type(),
                outcome,
                elapsed,
            });

            if stop {
                break;
            }
        }

        let skipped: Vec<String> = actions.map(|a| a.name().to_string()).collect();
        if !skipped.is_empty() {
            tracing::info!(skipped = skipped.len(), "Remaining actions skipped");
        }

        Ok(ScenarioReport {
            name: scenario.name,
            results,
            skipped,
        })
    }
}
