//! Client configuration with validation.

use serde::{Deserialize, Serialize};
use shared_bus::{OverflowPolicy, DEFAULT_LISTENER_CAPACITY};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long one engine `receive` call waits for a message
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Duration,
    /// How long `send` waits for the matching reply
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,
    /// Pause after the handshake reaches `Ready`
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    /// Pause before re-querying a handshake state that did not change
    #[serde(with = "humantime_serde")]
    pub auth_retry_delay: Duration,
    /// Events buffered per listener
    pub listener_capacity: usize,
    /// Replies buffered between the receive loop and the correlation task
    pub delivery_buffer: usize,
    /// What a broadcast does when a listener is full
    pub overflow_policy: OverflowPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_secs(60),
            send_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(1),
            auth_retry_delay: Duration::from_millis(100),
            listener_capacity: DEFAULT_LISTENER_CAPACITY,
            delivery_buffer: 1024,
            overflow_policy: OverflowPolicy::Block,
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TD_RECEIVE_TIMEOUT`: engine receive timeout (default: 60s)
    /// - `TD_SEND_TIMEOUT`: reply wait per request (default: 60s)
    /// - `TD_SETTLE_DELAY`: pause after authorization (default: 1s)
    /// - `TD_AUTH_RETRY_DELAY`: pause before re-querying an unchanged
    ///   authorization state (default: 100ms)
    /// - `TD_LISTENER_CAPACITY`: events buffered per listener (default: 1024)
    /// - `TD_DELIVERY_BUFFER`: replies buffered for correlation (default: 1024)
    /// - `TD_OVERFLOW_POLICY`: `block`, `block_for:<duration>`, `drop_oldest`
    ///   or `disconnect` (default: block)
    ///
    /// Durations use humantime syntax (`250ms`, `1m 30s`). Unset variables keep
    /// their defaults; set but unparsable ones are an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("TD_RECEIVE_TIMEOUT") {
            config.receive_timeout = parse_duration("TD_RECEIVE_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("TD_SEND_TIMEOUT") {
            config.send_timeout = parse_duration("TD_SEND_TIMEOUT", &value)?;
        }
        if let Some(value) = lookup("TD_SETTLE_DELAY") {
            config.settle_delay = parse_duration("TD_SETTLE_DELAY", &value)?;
        }
        if let Some(value) = lookup("TD_AUTH_RETRY_DELAY") {
            config.auth_retry_delay = parse_duration("TD_AUTH_RETRY_DELAY", &value)?;
        }
        if let Some(value) = lookup("TD_LISTENER_CAPACITY") {
            config.listener_capacity = parse_count("TD_LISTENER_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("TD_DELIVERY_BUFFER") {
            config.delivery_buffer = parse_count("TD_DELIVERY_BUFFER", &value)?;
        }
        if let Some(value) = lookup("TD_OVERFLOW_POLICY") {
            config.overflow_policy = value.parse().map_err(|e: shared_bus::PolicyParseError| {
                ConfigError::InvalidValue {
                    key: "TD_OVERFLOW_POLICY",
                    reason: e.to_string(),
                }
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("receive_timeout cannot be 0".into()));
        }

        if self.send_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("send_timeout cannot be 0".into()));
        }

        if self.listener_capacity == 0 {
            return Err(ConfigError::InvalidLimit("listener_capacity cannot be 0".into()));
        }

        if self.delivery_buffer == 0 {
            return Err(ConfigError::InvalidLimit("delivery_buffer cannot be 0".into()));
        }

        if let OverflowPolicy::BlockFor(bound) = self.overflow_policy {
            if bound.is_zero() {
                return Err(ConfigError::InvalidTimeout(
                    "block_for bound cannot be 0; use disconnect".into(),
                ));
            }
        }

        Ok(())
    }
}

fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

fn parse_count(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
