//! Scenario actions
//!
//! An [`Action`] is the executable form of one scenario step. Providers
//! turn step definitions into actions, validating them up front; an action
//! runs once and yields one terminal [`ActionOutcome`].

mod delay;
mod registry;
mod rpc;

pub use delay::{DelayAction, DelayActionProvider};
pub use registry::ActionRegistry;
pub use rpc::{RpcAction, RpcActionProvider};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::stream::CancelSignal;

use super::validator::Violation;
use super::variables::VariableStore;

/// Action discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Rpc,
    Delay,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpc => "Rpc",
            Self::Delay => "Delay",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rpc" => Ok(Self::Rpc),
            "delay" => Ok(Self::Delay),
            other => Err(Error::argument(format!("unknown action type '{}'", other))),
        }
    }
}

/// Lifecycle of an action; the last four states are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Created,
    Running,
    Passed,
    Failed,
    TimedOut,
    Cancelled,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Why an action failed
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub summary: String,
    pub violations: Vec<Violation>,
}

/// What an action was still waiting for when its timeout fired
#[derive(Debug, Clone)]
pub struct TimeoutReport {
    pub timeout: Duration,
    pub pending: Vec<String>,
}

/// Terminal result of running an action
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Passed,
    Failed(FailureReport),
    TimedOut(TimeoutReport),
    Cancelled,
}

impl ActionOutcome {
    /// Failure without field violations
    pub fn failed(summary: impl Into<String>) -> Self {
        Self::Failed(FailureReport {
            summary: summary.into(),
            violations: Vec::new(),
        })
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn state(&self) -> ActionState {
        match self {
            Self::Passed => ActionState::Passed,
            Self::Failed(_) => ActionState::Failed,
            Self::TimedOut(_) => ActionState::TimedOut,
            Self::Cancelled => ActionState::Cancelled,
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed(report) => {
                write!(f, "failed: {}", report.summary)?;
                for violation in &report.violations {
                    write!(f, "\n    {}", violation)?;
                }
                Ok(())
            }
            Self::TimedOut(report) => write!(
                f,
                "timed out after {}ms waiting for {}",
                report.timeout.as_millis(),
                report.pending.join(", ")
            ),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// State shared by the actions of one scenario run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub variables: VariableStore,
    pub cancel: CancelSignal,
}

impl ExecutionContext {
    pub fn new(variables: VariableStore, cancel: CancelSignal) -> Self {
        Self { variables, cancel }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(VariableStore::new(), CancelSignal::never())
    }
}

/// An executable scenario step
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration;

    fn action_type(&self) -> ActionType;

    fn state(&self) -> ActionState;

    /// Execute the action. Only valid from [`ActionState::Created`].
    async fn run(&mut self, ctx: &mut ExecutionContext) -> Result<ActionOutcome>;
}

/// Builds actions of one type from scenario step definitions
pub trait ActionProvider: Send + Sync {
    fn action_type(&self) -> ActionType;

    /// Validate `node` and build the action; never builds a partial action
    fn create(&self, node: &Value) -> Result<Box<dyn Action>>;
}

/// Fields common to every step definition
#[derive(Debug)]
pub(crate) struct StepHeader {
    pub name: String,
    pub timeout: Option<Duration>,
}

impl StepHeader {
    pub(crate) fn parse(node: &Value, action_type: ActionType) -> Result<Self> {
        let fields = node
            .as_object()
            .ok_or_else(|| Error::argument("action definition must be an object"))?;

        let name = match fields.get("actionName") {
            None | Some(Value::Null) => default_name(action_type),
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(Error::argument(format!(
                    "'actionName' must be a string, got {}",
                    other
                )))
            }
        };

        let timeout = match fields.get("timeout") {
            None | Some(Value::Null) => None,
            Some(value) => Some(Duration::from_millis(value.as_u64().ok_or_else(|| {
                Error::argument(format!(
                    "'timeout' must be a non-negative integer of milliseconds, got {}",
                    value
                ))
            })?)),
        };

        Ok(Self { name, timeout })
    }
}

fn default_name(action_type: ActionType) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", action_type.as_str().to_ascii_lowercase(), &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_type_parse_is_case_insensitive() {
        assert_eq!("rpc".parse::<ActionType>().unwrap(), ActionType::Rpc);
        assert_eq!("Delay".parse::<ActionType>().unwrap(), ActionType::Delay);
        assert!("grpc".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_header_defaults() {
        let header = StepHeader::parse(&json!({}), ActionType::Rpc).unwrap();
        assert!(header.name.starts_with("rpc-"));
        assert_eq!(header.name.len(), "rpc-".len() + 8);
        assert_eq!(header.timeout, None);
    }

    #[test]
    fn test_header_literal_values() {
        let header =
            StepHeader::parse(&json!({"actionName": "ping", "timeout": 0}), ActionType::Rpc)
                .unwrap();
        assert_eq!(header.name, "ping");
        assert_eq!(header.timeout, Some(Duration::ZERO));
    }

    #[test]
    fn test_header_rejects_negative_timeout() {
        let err = StepHeader::parse(&json!({"timeout": -5}), ActionType::Rpc).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_header_rejects_non_object() {
        assert!(StepHeader::parse(&json!([1]), ActionType::Delay).is_err());
    }

    #[test]
    fn test_outcome_display_lists_violations() {
        let outcome = ActionOutcome::Failed(FailureReport {
            summary: "messages[0] failed validation".to_string(),
            violations: vec![Violation::new("$.a", "equals", "expected 1, got 2")],
        });
        assert_eq!(
            outcome.to_string(),
            "failed: messages[0] failed validation\n    [equals] $.a: expected 1, got 2"
        );
        assert_eq!(outcome.state(), ActionState::Failed);
    }
}
