//! Executor configuration
//!
//! JSON file, every field optional:
//!
//! ```json
//! { "fetch_batch": 64, "log_runs": false }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for `PipelineExecutor`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Records requested from the source per page
    #[serde(default = "default_fetch_batch")]
    pub fetch_batch: usize,

    /// Emit begin/complete log lines for every run
    #[serde(default)]
    pub log_runs: bool,
}

fn default_fetch_batch() -> usize {
    64
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fetch_batch: default_fetch_batch(),
            log_runs: false,
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: ExecutorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.fetch_batch == 0 {
            return Err(ConfigError::Invalid(
                "fetch_batch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
