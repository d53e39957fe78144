//! Bounded retry of DELETE requests interrupted by connection resets.
//!
//! Only `TransportErrorKind::ConnectionReset` is retried. Every other
//! transport failure ends the loop on the spot.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;
use crate::transport::TransportError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Attempt budget and fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt; connection resets fail immediately.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the budget is spent. `attempt` receives the 1-based attempt number.
    pub(crate) fn run<T>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<T, TransportError>,
    ) -> Result<T, ApiError> {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_connection_reset() => return Err(ApiError::Transport(err)),
                Err(err) if n >= max_attempts => {
                    if max_attempts == 1 {
                        return Err(ApiError::Transport(err));
                    }
                    return Err(ApiError::RetriesExhausted {
                        attempts: n,
                        source: err,
                    });
                }
                Err(err) => {
                    warn!(attempt = n, max_attempts, error = %err, "connection reset, retrying");
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                    n += 1;
                }
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
