//! Configuration for the Specdeck engine.
//!
//! All tuning constants can be overridden through environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SPECDECK_INITIAL_DEPTH` | 2 | Folder depth of the fast first-paint load |
//! | `SPECDECK_FULL_LOAD_DELAY_MS` | 800 | Delay before the unbounded background load |
//! | `SPECDECK_RELOAD_DEBOUNCE_MS` | 300 | Quiet period before a change-triggered reload |
//! | `SPECDECK_FILE_RELOAD_DELAY_MS` | 150 | Delay before re-reading the open file |
//! | `SPECDECK_WORKER_POOL_SIZE` | 4 | Concurrent checklist readers |
//! | `SPECDECK_INITIAL_BATCH_SIZE` | 12 | Progress candidates processed immediately |
//! | `SPECDECK_BATCH_SIZE` | 8 | Progress candidates per follow-up batch |
//! | `SPECDECK_BATCH_INTERVAL_MS` | 120 | Interval between follow-up batches |
//! | `SPECDECK_MAX_TABS` | 5 | Hard cap on simultaneously open tabs |
//!
//! # Example
//!
//! ```
//! use specdeck_engine::config::EngineConfig;
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.max_tabs, 5);
//! ```

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default folder depth for the initial shallow load.
const DEFAULT_INITIAL_DEPTH: usize = 2;

/// Default delay before the unbounded background reload (in milliseconds).
const DEFAULT_FULL_LOAD_DELAY_MS: u64 = 800;

/// Default debounce window for change-triggered reloads (in milliseconds).
const DEFAULT_RELOAD_DEBOUNCE_MS: u64 = 300;

/// Default delay before re-reading the currently open file (in milliseconds).
/// Kept shorter than the reload debounce so single-file feedback stays
/// responsive while a heavier reload is still pending.
const DEFAULT_FILE_RELOAD_DELAY_MS: u64 = 150;

/// Default number of concurrent checklist-reading workers.
const DEFAULT_WORKER_POOL_SIZE: usize = 4;

/// Default number of progress candidates enqueued immediately.
const DEFAULT_INITIAL_BATCH_SIZE: usize = 12;

/// Default number of progress candidates per follow-up batch.
const DEFAULT_BATCH_SIZE: usize = 8;

/// Default interval between follow-up batches (in milliseconds).
const DEFAULT_BATCH_INTERVAL_MS: u64 = 120;

/// Default maximum number of simultaneously open tabs.
const DEFAULT_MAX_TABS: usize = 5;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The environment variable name.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
}

/// Tuning constants for the engine.
///
/// One instance is shared by every session a [`TabManager`](crate::tabs::TabManager)
/// creates.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Folder depth of the fast first-paint load.
    pub initial_depth: usize,

    /// Delay before the unbounded background load is started.
    pub full_load_delay: Duration,

    /// Quiet period after the last filesystem event before a full reload.
    pub reload_debounce: Duration,

    /// Delay before the currently open file is re-read after a change.
    pub file_reload_delay: Duration,

    /// Number of concurrent checklist-reading workers.
    pub worker_pool_size: usize,

    /// Number of progress candidates enqueued immediately on load.
    pub initial_batch_size: usize,

    /// Number of progress candidates per follow-up batch.
    pub batch_size: usize,

    /// Interval between follow-up candidate batches.
    pub batch_interval: Duration,

    /// Hard cap on simultaneously open tabs.
    pub max_tabs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_depth: DEFAULT_INITIAL_DEPTH,
            full_load_delay: Duration::from_millis(DEFAULT_FULL_LOAD_DELAY_MS),
            reload_debounce: Duration::from_millis(DEFAULT_RELOAD_DEBOUNCE_MS),
            file_reload_delay: Duration::from_millis(DEFAULT_FILE_RELOAD_DELAY_MS),
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            initial_batch_size: DEFAULT_INITIAL_BATCH_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS),
            max_tabs: DEFAULT_MAX_TABS,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but does
    /// not parse, or parses to a value the engine cannot run with (a zero
    /// worker pool or a zero tab cap).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            initial_depth: parse_usize("SPECDECK_INITIAL_DEPTH", DEFAULT_INITIAL_DEPTH)?,
            full_load_delay: parse_millis("SPECDECK_FULL_LOAD_DELAY_MS", DEFAULT_FULL_LOAD_DELAY_MS)?,
            reload_debounce: parse_millis("SPECDECK_RELOAD_DEBOUNCE_MS", DEFAULT_RELOAD_DEBOUNCE_MS)?,
            file_reload_delay: parse_millis(
                "SPECDECK_FILE_RELOAD_DELAY_MS",
                DEFAULT_FILE_RELOAD_DELAY_MS,
            )?,
            worker_pool_size: parse_usize("SPECDECK_WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE)?,
            initial_batch_size: parse_usize(
                "SPECDECK_INITIAL_BATCH_SIZE",
                DEFAULT_INITIAL_BATCH_SIZE,
            )?,
            batch_size: parse_usize("SPECDECK_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            batch_interval: parse_millis("SPECDECK_BATCH_INTERVAL_MS", DEFAULT_BATCH_INTERVAL_MS)?,
            max_tabs: parse_usize("SPECDECK_MAX_TABS", DEFAULT_MAX_TABS)?,
        };

        if config.worker_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SPECDECK_WORKER_POOL_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if config.max_tabs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SPECDECK_MAX_TABS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }
}

/// Parses an optional `usize` environment variable.
fn parse_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a non-negative integer, got {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Parses an optional millisecond duration environment variable.
fn parse_millis(key: &str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected milliseconds as an integer, got {raw:?}"),
            }),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_depth, 2);
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.max_tabs, 5);
        assert!(config.file_reload_delay < config.reload_debounce);
    }

    #[test]
    fn parse_usize_rejects_garbage() {
        env::set_var("SPECDECK_TEST_USIZE", "not-a-number");
        let err = parse_usize("SPECDECK_TEST_USIZE", 1).unwrap_err();
        assert!(err.to_string().contains("SPECDECK_TEST_USIZE"));
        env::remove_var("SPECDECK_TEST_USIZE");
    }

    #[test]
    fn parse_millis_accepts_plain_integer() {
        env::set_var("SPECDECK_TEST_MILLIS", "250");
        let value = parse_millis("SPECDECK_TEST_MILLIS", 1).unwrap();
        assert_eq!(value, Duration::from_millis(250));
        env::remove_var("SPECDECK_TEST_MILLIS");
    }

    #[test]
    fn parse_falls_back_to_default_when_unset() {
        env::remove_var("SPECDECK_TEST_UNSET");
        assert_eq!(parse_usize("SPECDECK_TEST_UNSET", 7).unwrap(), 7);
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            key: "SPECDECK_MAX_TABS".to_string(),
            message: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for SPECDECK_MAX_TABS: must be at least 1"
        );
    }
}
