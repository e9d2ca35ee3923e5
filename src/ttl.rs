//! Validity durations for persistent keys.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Sentinel accepted on the wire for a value that never expires.
pub const INFINITE: &str = "infinite";

/// How long a persisted value stays valid after it was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// Valid for this many milliseconds after `computed_at`.
    Millis(u64),
    /// Never expires.
    Infinite,
}

/// Invalid validity duration text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid TTL '{input}': {reason}")]
pub struct TtlError {
    pub input: String,
    pub reason: String,
}

impl Ttl {
    /// Parse a wire-format TTL.
    ///
    /// Returns `Ok(None)` for an empty string or a zero duration: both mean
    /// the key is memory-only.
    pub fn parse(input: &str) -> Result<Option<Self>, TtlError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed == INFINITE {
            return Ok(Some(Self::Infinite));
        }

        let millis = match trimmed.parse::<u64>() {
            Ok(ms) => ms,
            Err(_) => humantime::parse_duration(trimmed)
                .map_err(|e| TtlError {
                    input: input.to_string(),
                    reason: e.to_string(),
                })
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))?,
        };

        Ok((millis > 0).then_some(Self::Millis(millis)))
    }

    /// Whether a value computed at `computed_at` (epoch millis) is stale at `now`.
    pub fn is_expired(&self, computed_at: u64, now: u64) -> bool {
        match self {
            Self::Infinite => false,
            Self::Millis(ms) => now > computed_at.saturating_add(*ms),
        }
    }

    /// The duration, or `None` when infinite.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
            Self::Infinite => None,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Self::Millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{}ms", ms),
            Self::Infinite => f.write_str(INFINITE),
        }
    }
}
