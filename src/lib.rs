//! Worker Harness - scripted conversation testing for streaming RPC workers
//!
//! This library drives a worker process over a bidirectional message
//! stream, following a scenario of actions and checking every response
//! the worker sends back.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;
pub mod stream;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{ActionOutcome, ScenarioReport};
pub use stream::StreamingMessage;
