//! Configuration for the database resilience layer.
//!
//! Plain values only: retry ceilings and delays, health-check cadence, and
//! reconnect limits. Loaded from YAML with per-field defaults so an empty
//! document yields a fully working configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use db_resilience::config::{ResilienceConfig, load_config};
//!
//! let config = load_config(Some("resilience.yaml"))?;
//! let policy = config.retry.to_policy();
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::retry::RetryPolicy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Retry executor configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Health monitor configuration.
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    /// Connection manager configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Retry executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry, in milliseconds. Doubles per
    /// attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay, in milliseconds.
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

impl RetryConfig {
    /// Convert to the internal [`RetryPolicy`] used by the retry executor.
    #[must_use]
    pub const fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            jitter_max: Duration::from_millis(self.jitter_max_ms),
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Enable the periodic health-check tasks.
    #[serde(default = "default_health_check_enabled")]
    pub enabled: bool,
    /// Interval between scheduled probes, in seconds.
    #[serde(default = "default_health_check_interval")]
    pub interval_seconds: u64,
    /// Consecutive failing probes required before health flips to unhealthy.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Maximum age of the cached health status, in seconds. Older values are
    /// treated as unknown and reported unhealthy.
    #[serde(default = "default_health_staleness")]
    pub staleness_window_seconds: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_check_enabled(),
            interval_seconds: default_health_check_interval(),
            max_consecutive_failures: default_max_consecutive_failures(),
            staleness_window_seconds: default_health_staleness(),
        }
    }
}

impl HealthCheckConfig {
    /// Probe interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Staleness window as a [`Duration`].
    #[must_use]
    pub const fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_seconds)
    }
}

/// Connection manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Reconnect attempt ceiling before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay before the first reconnect attempt, in milliseconds.
    /// Grows by 1.5x per attempt (coarser than the retry executor's curve).
    #[serde(default = "default_base_reconnect_delay_ms")]
    pub base_reconnect_delay_ms: u64,
    /// Maximum age of the cached connection status, in seconds. Older values
    /// are treated as disconnected.
    #[serde(default = "default_connection_staleness")]
    pub staleness_window_seconds: u64,
    /// Hard ceiling on a single probe, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            base_reconnect_delay_ms: default_base_reconnect_delay_ms(),
            staleness_window_seconds: default_connection_staleness(),
            probe_timeout_seconds: default_probe_timeout(),
        }
    }
}

impl ConnectionConfig {
    /// Base reconnect delay as a [`Duration`].
    #[must_use]
    pub const fn base_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.base_reconnect_delay_ms)
    }

    /// Staleness window as a [`Duration`].
    #[must_use]
    pub const fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_seconds)
    }

    /// Probe timeout as a [`Duration`].
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

const fn default_max_retries() -> u32 {
    3
}
const fn default_retry_delay_ms() -> u64 {
    1_000
}
const fn default_jitter_max_ms() -> u64 {
    1_000
}
const fn default_health_check_enabled() -> bool {
    true
}
const fn default_health_check_interval() -> u64 {
    30
}
const fn default_max_consecutive_failures() -> u32 {
    3
}
const fn default_health_staleness() -> u64 {
    600 // 10 minutes
}
const fn default_max_reconnect_attempts() -> u32 {
    10
}
const fn default_base_reconnect_delay_ms() -> u64 {
    1_000
}
const fn default_connection_staleness() -> u64 {
    300 // 5 minutes
}
const fn default_probe_timeout() -> u64 {
    5
}

impl ResilienceConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero attempt ceilings or
    /// zero intervals, which would stall the respective loops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }
        if self.health_check.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "health_check.interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.health_check.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationError(
                "health_check.max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if self.connection.max_reconnect_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "connection.max_reconnect_attempts must be at least 1".to_string(),
            ));
        }
        if self.connection.probe_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "connection.probe_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file, falling back to `resilience.yaml`.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<ResilienceConfig, ConfigError> {
    let path = path.unwrap_or("resilience.yaml");
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_string(),
        source,
    })?;

    let config: ResilienceConfig = serde_yaml_bw::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
