//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Action timeout defaults
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Worker process to launch when the CLI does not name one
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Scenario run policy
    #[serde(default)]
    pub run: RunConfig,
}

/// Timeout settings in milliseconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Default timeout for rpc actions that don't declare one
    #[serde(default = "default_rpc_action")]
    pub rpc_action_ms: u64,

    /// Default pause for delay actions that don't declare one
    #[serde(default = "default_delay_action")]
    pub delay_action_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rpc_action_ms: default_rpc_action(),
            delay_action_ms: default_delay_action(),
        }
    }
}

fn default_rpc_action() -> u64 {
    10_000
}
fn default_delay_action() -> u64 {
    1_000
}

impl Timeouts {
    pub fn rpc_action(&self) -> Duration {
        Duration::from_millis(self.rpc_action_ms)
    }

    pub fn delay_action(&self) -> Duration {
        Duration::from_millis(self.delay_action_ms)
    }
}

/// Worker process configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct WorkerConfig {
    /// Path to the worker executable
    pub program: Option<PathBuf>,

    /// Additional arguments to pass to the worker
    #[serde(default)]
    pub args: Vec<String>,
}

/// Scenario run policy
#[derive(Debug, Deserialize, Default)]
pub struct RunConfig {
    /// Keep running later actions after one fails or times out
    #[serde(default)]
    pub continue_on_failure: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
