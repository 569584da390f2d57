//! Configuration management for rsload hosts.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use rsload_runtime::config::RuntimeConfig;
//!
//! // Load from file with env overrides
//! let config = RuntimeConfig::load("rsload.yaml")?;
//!
//! // Or load from environment only
//! let config = RuntimeConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use rsload_domain::loader::{LoaderConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_WAIT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound on the batching window, in milliseconds.
pub const MAX_WAIT_MS: u64 = 60_000;

/// Runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RuntimeConfig {
    /// Loader batching settings
    #[serde(default)]
    pub loader: LoaderSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Loader batching settings.
///
/// Environment variables use the `RSLOAD_` prefix and `__` as the nested
/// key separator:
///
/// - `RSLOAD_LOADER__MAX_BATCH_SIZE=50`
/// - `RSLOAD_LOADER__WAIT_MS=5`
///
/// # Example YAML Configuration
///
/// ```yaml
/// loader:
///   max_batch_size: 100
///   wait_ms: 16
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoaderSettings {
    /// Distinct keys at which a pending batch flushes immediately.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Batching window in milliseconds, measured from a batch's first key.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            wait_ms: default_wait_ms(),
        }
    }
}

impl LoaderSettings {
    /// Converts these settings into a domain [`LoaderConfig`].
    pub fn to_loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_max_batch_size(self.max_batch_size)
            .with_wait(Duration::from_millis(self.wait_ms))
    }
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT.as_millis() as u64
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,

    /// Emit span open/close events, for timing fetches inside host spans
    #[serde(default)]
    pub spans: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            spans: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MetricsSettings {
    /// Register loader metric descriptions at startup
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl RuntimeConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RSLOAD_` and use `__` as separator.
    /// For example `RSLOAD_LOADER__WAIT_MS=5` overrides `loader.wait_ms`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&RuntimeConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;

        let runtime_config: RuntimeConfig = config.try_deserialize()?;
        runtime_config.validate()?;

        Ok(runtime_config)
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via RSLOAD_ prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&RuntimeConfig::default())?)
            .add_source(env_source())
            .build()?;

        let runtime_config: RuntimeConfig = config.try_deserialize()?;
        runtime_config.validate()?;

        Ok(runtime_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.loader.max_batch_size == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "loader.max_batch_size must be greater than 0".to_string(),
            });
        }

        if self.loader.wait_ms == 0 || self.loader.wait_ms > MAX_WAIT_MS {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "loader.wait_ms must be between 1 and {MAX_WAIT_MS}, got: {}",
                    self.loader.wait_ms
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

// Use __ as separator for nested keys: RSLOAD_LOADER__WAIT_MS -> loader.wait_ms
fn env_source() -> Environment {
    Environment::with_prefix("RSLOAD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
