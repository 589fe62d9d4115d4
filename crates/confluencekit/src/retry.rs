//! Retry policy for transport failures
//!
//! The policy is a plain value consulted by [`ApiClient`](crate::ApiClient)
//! after each failed attempt. Only transport-class errors are retried;
//! HTTP error statuses (including 429) are returned to the caller as-is.

use crate::error::ConfluenceError;
use std::time::Duration;

/// Default number of automatic retries
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Default fixed delay before a retry
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Bounded, fixed-backoff retry rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Set the backoff delay
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Decide whether a failed attempt should be retried
    ///
    /// `retries_done` counts retries already performed (0 after the first
    /// attempt). Returns the delay to wait before retrying, or `None` if the
    /// error must be surfaced.
    pub fn next_delay(&self, retries_done: u32, error: &ConfluenceError) -> Option<Duration> {
        if retries_done >= self.max_retries || !error.is_transport() {
            return None;
        }
        Some(self.backoff)
    }
}
