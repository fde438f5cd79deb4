//! Event Relay configuration.
//!
//! [`AnalyticsConfig`] carries the application-supplied knobs for the
//! batching pipeline plus built-in fallbacks for the four server-advised
//! limits. The fallbacks govern batching until the first successful upload
//! response replaces the persisted values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the analytics batching pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Minimum wait between uploads while the app is backgrounded (ms).
    /// Background LOW-priority events are throttled to this interval.
    #[serde(default = "default_background_reporting_interval_ms")]
    pub background_reporting_interval_ms: u64,

    /// Delay after the last surface stops before the app is considered
    /// backgrounded (ms). Covers surface teardown/rebuild during
    /// configuration changes such as rotation.
    #[serde(default = "default_background_debounce_ms")]
    pub background_debounce_ms: u64,

    /// Fallback cap on total stored event bytes until the server advises one.
    #[serde(default = "default_max_total_db_size_bytes")]
    pub max_total_db_size_bytes: u64,

    /// Fallback cap on bytes per upload batch until the server advises one.
    #[serde(default = "default_max_batch_size_bytes")]
    pub max_batch_size_bytes: u64,

    /// Fallback maximum wait before events must be uploaded (ms).
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Fallback minimum interval between uploads (ms).
    #[serde(default = "default_min_batch_interval_ms")]
    pub min_batch_interval_ms: u64,

    /// Backoff applied by the deferred-job runtime between retries of a
    /// failed upload attempt (ms).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_background_reporting_interval_ms() -> u64 {
    15 * 60 * 1000 // 15 min
}

fn default_background_debounce_ms() -> u64 {
    2_000
}

fn default_max_total_db_size_bytes() -> u64 {
    5 * 1024 * 1024 // 5 MiB
}

fn default_max_batch_size_bytes() -> u64 {
    500 * 1024 // 500 KiB
}

fn default_max_wait_ms() -> u64 {
    14 * 24 * 3600 * 1000 // 14 days
}

fn default_min_batch_interval_ms() -> u64 {
    60_000
}

fn default_retry_backoff_ms() -> u64 {
    60_000
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            background_reporting_interval_ms: default_background_reporting_interval_ms(),
            background_debounce_ms: default_background_debounce_ms(),
            max_total_db_size_bytes: default_max_total_db_size_bytes(),
            max_batch_size_bytes: default_max_batch_size_bytes(),
            max_wait_ms: default_max_wait_ms(),
            min_batch_interval_ms: default_min_batch_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_db_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_total_db_size_bytes must be non-zero".to_string(),
            ));
        }
        if self.max_batch_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_batch_size_bytes must be non-zero".to_string(),
            ));
        }
        if self.max_batch_size_bytes > self.max_total_db_size_bytes {
            return Err(ConfigError::Invalid(format!(
                "max_batch_size_bytes ({}) exceeds max_total_db_size_bytes ({})",
                self.max_batch_size_bytes, self.max_total_db_size_bytes
            )));
        }
        if self.min_batch_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "min_batch_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.max_wait_ms < self.min_batch_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "max_wait_ms ({}) is below min_batch_interval_ms ({})",
                self.max_wait_ms, self.min_batch_interval_ms
            )));
        }
        Ok(())
    }
}
