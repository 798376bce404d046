//! Retry policy and the fetch retry state machine
//!
//! A fetch moves through
//! `Attempting(n) -> Backoff { .. } -> Attempting(n + 1) -> ...` until it
//! either reaches `Succeeded` or, after the backoff following the last
//! allowed attempt, lands in `Exhausted`. Transitions are plain functions of the current attempt, the
//! failure observed, and a jitter sample, so wait times are testable without
//! a clock.

use std::time::Duration;
use thiserror::Error;

/// Why a single attempt did not produce a usable page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

/// Bounded retry budget with exponential backoff for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Base delay between attempts
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Wait before the attempt following the zero-based `attempt`
    ///
    /// | Failure | Wait |
    /// |---------|------|
    /// | HTTP 429 | `base_delay * 2^attempt + jitter` seconds |
    /// | Other status | `base_delay` |
    /// | Network fault | `base_delay` |
    ///
    /// `jitter` is a sample from `[0, 1)` and is only applied to rate limiting.
    pub fn backoff_delay(&self, attempt: u32, failure: &AttemptFailure, jitter: f64) -> Duration {
        match failure {
            AttemptFailure::RateLimited => {
                let factor = 2u32.saturating_pow(attempt);
                self.base_delay.saturating_mul(factor) + Duration::from_secs_f64(jitter.max(0.0))
            }
            AttemptFailure::Status(_) | AttemptFailure::Network(_) => self.base_delay,
        }
    }
}

/// State of a single retried fetch
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState<T> {
    /// About to issue the zero-based attempt
    Attempting(u32),

    /// Waiting before the next attempt
    Backoff {
        attempt: u32,
        wait: Duration,
        reason: AttemptFailure,
    },

    Succeeded(T),

    Exhausted {
        attempts: u32,
        last_failure: AttemptFailure,
    },
}

impl<T> RetryState<T> {
    pub fn start() -> Self {
        RetryState::Attempting(0)
    }

    /// Transition after `attempt` failed
    ///
    /// Every failure waits, including the last one; the budget is checked
    /// when the wait ends.
    pub fn failed(
        attempt: u32,
        failure: AttemptFailure,
        policy: &RetryPolicy,
        jitter: f64,
    ) -> Self {
        RetryState::Backoff {
            attempt,
            wait: policy.backoff_delay(attempt, &failure, jitter),
            reason: failure,
        }
    }

    /// Transition once the backoff wait has elapsed
    pub fn resume(self, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Backoff {
                attempt, reason, ..
            } if attempt + 1 >= policy.max_attempts => RetryState::Exhausted {
                attempts: attempt + 1,
                last_failure: reason,
            },
            RetryState::Backoff { attempt, .. } => RetryState::Attempting(attempt + 1),
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded(_) | RetryState::Exhausted { .. })
    }
}
