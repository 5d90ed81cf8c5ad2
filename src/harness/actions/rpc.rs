//! Rpc action: send scripted messages, then wait for matching responses

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::common::{Error, Result};
use crate::harness::builder::MessageBuilder;
use crate::harness::matcher::{Expectation, MessageMatcher};
use crate::harness::template::MessageTemplate;
use crate::harness::validator::{select_guarded, ValidatorEngine, Violation};
use crate::stream::{MessageChannel, Received};

use super::{
    Action, ActionOutcome, ActionProvider, ActionState, ActionType, ExecutionContext,
    FailureReport, StepHeader, TimeoutReport,
};

/// Sends every templated message in order, then waits until each declared
/// expectation is matched and validated or the timeout elapses
pub struct RpcAction {
    name: String,
    timeout: Duration,
    templates: Vec<MessageTemplate>,
    state: ActionState,
    builder: Arc<dyn MessageBuilder>,
    matcher: Arc<dyn MessageMatcher>,
    validator: Arc<dyn ValidatorEngine>,
    channel: Arc<dyn MessageChannel>,
}

impl RpcAction {
    /// Number of message templates
    pub fn message_count(&self) -> usize {
        self.templates.len()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> ActionOutcome {
        if ctx.cancel.is_cancelled() {
            return ActionOutcome::Cancelled;
        }

        let mut pending = Vec::new();
        for template in &self.templates {
            let mut sent_request_id = None;

            if let Some(outgoing) = &template.outgoing {
                let message = match self.builder.build(outgoing, &ctx.variables) {
                    Ok(message) => message,
                    Err(e) => {
                        return ActionOutcome::failed(format!(
                            "{}: could not build message: {}",
                            template.label(),
                            e
                        ))
                    }
                };
                sent_request_id = Some(message.request_id.clone());
                if let Err(e) = self.channel.send(message) {
                    return ActionOutcome::failed(format!("{}: {}", template.label(), e));
                }
            }

            if let Some(expect) = &template.expect {
                match expect.instantiate(&ctx.variables, sent_request_id.as_deref()) {
                    Ok(expectation) => pending.push(expectation),
                    Err(e) => {
                        return ActionOutcome::failed(format!(
                            "{}: could not prepare expectation: {}",
                            expect.label, e
                        ))
                    }
                }
            }
        }

        if self.timeout.is_zero() {
            if !pending.is_empty() {
                tracing::debug!(
                    action = %self.name,
                    expectations = pending.len(),
                    "Zero timeout, not waiting for responses"
                );
            }
            return ActionOutcome::Passed;
        }

        self.await_expectations(pending, ctx).await
    }

    async fn await_expectations(
        &self,
        mut pending: Vec<Expectation>,
        ctx: &mut ExecutionContext,
    ) -> ActionOutcome {
        let deadline = Instant::now() + self.timeout;
        let mut ignored = 0usize;

        let outcome = loop {
            if pending.is_empty() {
                break ActionOutcome::Passed;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());

            let message = match self.channel.receive(remaining, &ctx.cancel).await {
                Received::Message(message) => message,
                Received::TimedOut => {
                    break ActionOutcome::TimedOut(TimeoutReport {
                        timeout: self.timeout,
                        pending: pending.into_iter().map(|e| e.label).collect(),
                    })
                }
                Received::Cancelled => break ActionOutcome::Cancelled,
                Received::Closed => {
                    break ActionOutcome::failed(format!(
                        "{} while waiting for {}",
                        Error::ChannelClosed,
                        pending[0].label
                    ))
                }
            };

            let Some(index) = self.matcher.find_match(&message, &pending) else {
                ignored += 1;
                tracing::trace!(action = %self.name, message = %message.describe(), "Ignoring unmatched message");
                continue;
            };

            let expectation = pending.remove(index);
            let value = message.to_value();
            let mut violations = self.validator.validate(&value, &expectation.assertions);
            violations.extend(capture(&expectation, &value, ctx));

            if !violations.is_empty() {
                break ActionOutcome::Failed(FailureReport {
                    summary: format!("{} failed validation", expectation.label),
                    violations,
                });
            }
            tracing::debug!(action = %self.name, expectation = %expectation.label, "Expectation satisfied");
        };

        if ignored > 0 {
            tracing::debug!(action = %self.name, ignored, "Unmatched messages ignored");
        }
        outcome
    }
}

/// Store captured values; a capture that selects nothing is a violation
fn capture(expectation: &Expectation, message: &Value, ctx: &mut ExecutionContext) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (variable, query) in &expectation.captures {
        match select_guarded(message, query) {
            Ok(selected) if !selected.is_empty() => {
                ctx.variables.set(variable.clone(), selected[0].clone());
            }
            Ok(_) => violations.push(Violation::new(query.clone(), "capture", "field not found")),
            Err(reason) => violations.push(Violation::new(query.clone(), "capture", reason)),
        }
    }
    violations
}

#[async_trait]
impl Action for RpcAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn action_type(&self) -> ActionType {
        ActionType::Rpc
    }

    fn state(&self) -> ActionState {
        self.state
    }

    async fn run(&mut self, ctx: &mut ExecutionContext) -> Result<ActionOutcome> {
        if self.state != ActionState::Created {
            return Err(Error::invalid_state("run", &self.state.to_string()));
        }
        self.state = ActionState::Running;
        tracing::info!(
            action = %self.name,
            messages = self.message_count(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Running rpc action"
        );

        let outcome = self.execute(ctx).await;
        self.state = outcome.state();
        Ok(outcome)
    }
}

/// Builds [`RpcAction`]s bound to one channel
pub struct RpcActionProvider {
    builder: Arc<dyn MessageBuilder>,
    matcher: Arc<dyn MessageMatcher>,
    validator: Arc<dyn ValidatorEngine>,
    channel: Arc<dyn MessageChannel>,
    default_timeout: Duration,
}

impl RpcActionProvider {
    /// Error text when `messages` is missing, not an array, or empty
    pub const ARGUMENT_MISSING_MESSAGES_PROPERTY: &'static str =
        "The rpc action is missing the 'messages' property or it is invalid: expected a non-empty array of message templates";

    pub fn new(
        builder: Arc<dyn MessageBuilder>,
        matcher: Arc<dyn MessageMatcher>,
        validator: Arc<dyn ValidatorEngine>,
        channel: Arc<dyn MessageChannel>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            builder,
            matcher,
            validator,
            channel,
            default_timeout,
        }
    }
}

impl ActionProvider for RpcActionProvider {
    fn action_type(&self) -> ActionType {
        ActionType::Rpc
    }

    fn create(&self, node: &Value) -> Result<Box<dyn Action>> {
        let messages = match node.get("messages") {
            Some(Value::Array(messages)) if !messages.is_empty() => messages,
            _ => return Err(Error::argument(Self::ARGUMENT_MISSING_MESSAGES_PROPERTY)),
        };
        let header = StepHeader::parse(node, ActionType::Rpc)?;

        let templates = messages
            .iter()
            .enumerate()
            .map(|(index, template)| MessageTemplate::parse(index, template))
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(RpcAction {
            name: header.name,
            timeout: header.timeout.unwrap_or(self.default_timeout),
            templates,
            state: ActionState::Created,
            builder: Arc::clone(&self.builder),
            matcher: Arc::clone(&self.matcher),
            validator: Arc::clone(&self.validator),
            channel: Arc::clone(&self.channel),
        }))
    }
}
