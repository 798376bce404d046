//! Sleep abstraction and randomized delays
//!
//! Every wait in the pipeline (retry backoff, per-unit jitter, pagination
//! spacing) goes through a [`Sleeper`], so tests can observe waits without
//! actually sleeping.

use async_trait::async_trait;
use std::time::Duration;

/// Suspends the current task for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns a uniformly distributed duration in `[min, max]`
///
/// An inverted range collapses to `min`.
pub fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    min + (max - min).mul_f64(fastrand::f64())
}
