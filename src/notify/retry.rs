//! Retry ladder for push gateway calls.
//!
//! The delay before retry `n` is `n * coefficient`, with one coefficient for
//! server errors and another for everything else. Kept free of any HTTP
//! client so it can be reasoned about and tested on its own.

use std::time::Duration;

use crate::config::defaults::{
    PUSH_ATTEMPT_TIMEOUT_MS, PUSH_CLIENT_ERROR_BACKOFF_MS, PUSH_MAX_ATTEMPTS,
    PUSH_SERVER_ERROR_BACKOFF_MS,
};

/// Why an attempt failed, as far as the ladder cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 5xx
    ServerError,
    /// HTTP 4xx (and any other non-2xx below 500)
    ClientError,
    /// Connection refused, DNS, reset, ...
    Network,
    /// The attempt exceeded its timeout and was aborted
    Timeout,
}

impl FailureKind {
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 {
            FailureKind::ServerError
        } else {
            FailureKind::ClientError
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
    /// Per-attempt backoff after a 5xx
    pub server_error_backoff: Duration,
    /// Per-attempt backoff after a 4xx, network error or timeout
    pub client_error_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: PUSH_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_millis(PUSH_ATTEMPT_TIMEOUT_MS),
            server_error_backoff: Duration::from_millis(PUSH_SERVER_ERROR_BACKOFF_MS),
            client_error_backoff: Duration::from_millis(PUSH_CLIENT_ERROR_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, kind: FailureKind) -> Duration {
        let coefficient = match kind {
            FailureKind::ServerError => self.server_error_backoff,
            FailureKind::ClientError | FailureKind::Network | FailureKind::Timeout => {
                self.client_error_backoff
            }
        };
        coefficient.saturating_mul(attempt)
    }

    /// Whether another attempt follows failed attempt `attempt`.
    pub const fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
