//! # Overflow Policy
//!
//! What a broadcast does when a listener's queue is full.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Backpressure behaviour for a full listener queue.
///
/// Textual form, used in configuration and environment variables:
/// `block`, `block_for:<duration>` (e.g. `block_for:250ms`), `drop_oldest`,
/// `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OverflowPolicy {
    /// Wait until the listener makes room. A stalled listener stalls the
    /// broadcaster.
    #[default]
    Block,

    /// Wait up to the bound, then disconnect the listener.
    BlockFor(Duration),

    /// Evict the oldest queued event to make room.
    DropOldest,

    /// Disconnect the listener immediately.
    Disconnect,
}

/// Unparsable overflow policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyParseError {
    #[error("unknown overflow policy: {0}")]
    Unknown(String),

    #[error("invalid block_for duration {value}: {reason}")]
    Duration { value: String, reason: String },
}

impl FromStr for OverflowPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(bound) = s.strip_prefix("block_for:") {
            let bound = humantime::parse_duration(bound.trim()).map_err(|e| PolicyParseError::Duration {
                value: bound.to_owned(),
                reason: e.to_string(),
            })?;
            return Ok(Self::BlockFor(bound));
        }

        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop_oldest" => Ok(Self::DropOldest),
            "disconnect" => Ok(Self::Disconnect),
            _ => Err(PolicyParseError::Unknown(s.to_owned())),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::BlockFor(bound) => write!(f, "block_for:{}", humantime::format_duration(*bound)),
            Self::DropOldest => f.write_str("drop_oldest"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

impl TryFrom<String> for OverflowPolicy {
    type Error = PolicyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OverflowPolicy> for String {
    fn from(policy: OverflowPolicy) -> Self {
        policy.to_string()
    }
}
