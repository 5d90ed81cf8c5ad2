//! Scenario engine
//!
//! Scenarios are lists of actions. Rpc actions send templated
//! [`StreamingMessage`](crate::stream::StreamingMessage)s to the worker and
//! wait for responses that satisfy structural patterns and field
//! validators; delay actions pause. The [`Orchestrator`] runs actions in
//! order and collects a [`ScenarioReport`].

pub mod actions;
pub mod builder;
pub mod matcher;
pub mod orchestrator;
pub mod runner;
pub mod scenario;
pub mod template;
pub mod validator;
pub mod variables;

pub use actions::{
    Action, ActionOutcome, ActionProvider, ActionRegistry, ActionState, ActionType,
    ExecutionContext,
};
pub use orchestrator::{ActionResult, Orchestrator, ScenarioReport};
pub use runner::{check_scenario, run_scenario, RunOptions};
pub use scenario::{Scenario, ScenarioDefinition};
pub use variables::VariableStore;
