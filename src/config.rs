use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "SCRIPT_BRIDGE_CONFIG";

const DEFAULT_COMMAND_BUFFER_CAPACITY: usize = 64;
const DEFAULT_MAX_REPORTED_ERRORS: usize = 128;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Tunables for an [`ExecutingContext`](crate::context::ExecutingContext).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Initial capacity of the command buffer between flushes.
    pub command_buffer_capacity: usize,
    /// How many script errors the context keeps before dropping the oldest.
    pub max_reported_errors: usize,
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_buffer_capacity: DEFAULT_COMMAND_BUFFER_CAPACITY,
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                let config: BridgeConfig = serde_yaml::from_str(&contents)?;
                Ok(config)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }
}
