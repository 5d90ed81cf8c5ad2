//! Error types for the worker harness
//!
//! Construction-time problems (malformed scenarios) surface as errors from
//! this module. Per-action failures and timeouts are not errors: they are
//! recorded as an [`ActionOutcome`](crate::harness::ActionOutcome).

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the worker harness
#[derive(Error, Debug)]
pub enum Error {
    // === Scenario Errors ===
    /// Invalid scenario input. The message is shown verbatim so callers can
    /// compare it against the documented constants.
    #[error("{0}")]
    Argument(String),

    #[error("Unresolved variable '{0}'")]
    UnresolvedVariable(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Action Errors ===
    #[error("Cannot {action} while action is {state}")]
    InvalidState { action: String, state: String },

    // === Worker/Channel Errors ===
    #[error("Worker failed to start: {0}")]
    WorkerStartFailed(String),

    #[error("Worker process exited unexpectedly")]
    WorkerCrashed,

    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Stream protocol error: {0}")]
    Protocol(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an argument error from any message
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(action: &str, state: &str) -> Self {
        Self::InvalidState {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}
