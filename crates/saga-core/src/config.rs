//! Configuration loading and typed config structures.
//!
//! The configuration lives in `saga-config.yaml` next to the binary's
//! working directory. Every section and field has a default, so an absent
//! file or a partial one is fine.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::branch::AutoBranchPolicy;
use crate::notification::DEFAULT_NOTIFICATION_CAPACITY;

/// Environment variable overriding [`RunConfig::forest_path`].
pub const FOREST_PATH_ENV: &str = "SAGA_FOREST_PATH";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SagaConfig {
    /// Scheduler behaviour.
    #[serde(default)]
    pub engine: SchedulerConfig,

    /// Turn driver settings.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SagaConfig {
    /// Load configuration from a YAML file.
    ///
    /// `SAGA_FOREST_PATH` overrides `run.forest_path` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.run.apply_env_overrides();
        Ok(config)
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// How automatic branches are picked.
    #[serde(default)]
    pub auto_branch_policy: AutoBranchPolicy,

    /// Seed for the weighted branch policy.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Maximum undrained notifications kept.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_branch_policy: AutoBranchPolicy::default(),
            seed: default_seed(),
            notification_capacity: default_notification_capacity(),
        }
    }
}

/// Turn driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Path of the forest file to load.
    #[serde(default = "default_forest_path")]
    pub forest_path: PathBuf,

    /// Turn number used to initialize the forest.
    #[serde(default)]
    pub start_turn: u64,

    /// Number of turns to advance after initialization.
    #[serde(default = "default_max_turns")]
    pub max_turns: u64,

    /// Real-time pause between turns, in milliseconds.
    #[serde(default)]
    pub turn_interval_ms: u64,

    /// Play the story headlessly: finish one task per active event each
    /// turn and answer pending decisions with their lowest-id branch.
    #[serde(default)]
    pub autoplay: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            forest_path: default_forest_path(),
            start_turn: 0,
            max_turns: default_max_turns(),
            turn_interval_ms: 0,
            autoplay: false,
        }
    }
}

impl RunConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(FOREST_PATH_ENV) {
            if !path.is_empty() {
                self.forest_path = PathBuf::from(path);
            }
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset (trace, debug, info, ...).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_seed() -> u64 {
    42
}

const fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

fn default_forest_path() -> PathBuf {
    PathBuf::from("forest.yaml")
}

const fn default_max_turns() -> u64 {
    100
}

fn default_log_level() -> String {
    String::from("info")
}
