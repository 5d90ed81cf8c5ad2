//! Delay action: pause the scenario without touching the worker

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{Error, Result};

use super::{
    Action, ActionOutcome, ActionProvider, ActionState, ActionType, ExecutionContext, StepHeader,
};

/// Sleeps for its timeout; passes unless cancelled first
pub struct DelayAction {
    name: String,
    duration: Duration,
    state: ActionState,
}

#[async_trait]
impl Action for DelayAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.duration
    }

    fn action_type(&self) -> ActionType {
        ActionType::Delay
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> Result<ActionOutcome> {
        if self.state != ActionState::Created {
            return Err(Error::invalid_state("run", &self.state.to_string()));
        }
        self.state = ActionState::Running;
        tracing::debug!(action = %self.name, delay_ms = self.duration.as_millis() as u64, "Delaying");

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => ActionOutcome::Cancelled,
            _ = tokio::time::sleep(self.duration) => ActionOutcome::Passed,
        };

        self.state = outcome.state();
        Ok(outcome)
    }
}

/// Builds [`DelayAction`]s; `timeout` is the delay length
pub struct DelayActionProvider {
    default_delay: Duration,
}

impl DelayActionProvider {
    pub fn new(default_delay: Duration) -> Self {
        Self { default_delay }
    }
}

impl ActionProvider for DelayActionProvider {
    fn action_type(&self) -> ActionType {
        ActionType::Delay
    }

    fn create(&self, node: &Value) -> Result<Box<dyn Action>> {
        let header = StepHeader::parse(node, ActionType::Delay)?;
        Ok(Box::new(DelayAction {
            name: header.name,
            duration: header.timeout.unwrap_or(self.default_delay),
            state: ActionState::Created,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::cancel_pair;
    use serde_json::json;
    use std::time::Instant;

    #[test]
    fn test_create_defaults() {
        let action = DelayActionProvider::new(Duration::from_millis(1000))
            .create(&json!({"type": "delay"}))
            .unwrap();
        assert!(action.name().starts_with("delay-"));
        assert_eq!(action.timeout(), Duration::from_millis(1000));
        assert_eq!(action.action_type().to_string(), "Delay");
    }

    #[tokio::test]
    async fn test_delay_waits() {
        let mut action = DelayActionProvider::new(Duration::from_secs(1))
            .create(&json!({"actionName": "pause", "timeout": 50}))
            .unwrap();

        let started = Instant::now();
        let outcome = action.run(&mut ExecutionContext::default()).await.unwrap();

        assert!(outcome.is_passed());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(action.state(), ActionState::Passed);
    }

    #[tokio::test]
    async fn test_delay_cancelled() {
        let mut action = DelayActionProvider::new(Duration::from_secs(1))
            .create(&json!({"timeout": 60_000}))
            .unwrap();
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let mut ctx = ExecutionContext::new(Default::default(), signal);
        let outcome = action.run(&mut ctx).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Cancelled));
    }
}
