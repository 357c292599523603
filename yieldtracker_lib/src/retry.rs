//! Bounded retry with exponential backoff for price feed requests.
//!
//! Transient failures (rate limits, timeouts, network and upstream errors) are
//! retried with `base_backoff * 2^attempt` plus random jitter. Anything else
//! returns immediately. After the last attempt the error is surfaced as-is.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::feed::FeedError;

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    /// Upper bound of the random jitter added to each backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`, jitter excluded.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(multiplier)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Atomic counters tracking feed request outcomes.
#[derive(Debug, Default)]
pub struct RequestTracker {
    requests_made: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_retried: AtomicU64,
    requests_failed: AtomicU64,
    /// Cumulative backoff time in milliseconds.
    total_backoff_ms: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backoff(&self, duration: Duration) {
        self.total_backoff_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Snapshot the current counters.
    pub fn summary(&self) -> TrackerSummary {
        TrackerSummary {
            requests_made: self.requests_made.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_retried: self.requests_retried.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            total_backoff_secs: self.total_backoff_ms.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Immutable snapshot of tracker counters for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSummary {
    pub requests_made: u64,
    pub requests_succeeded: u64,
    pub requests_retried: u64,
    pub requests_failed: u64,
    pub total_backoff_secs: f64,
}

/// Execute an async feed operation, retrying transient failures.
///
/// Records every attempt on `tracker`. Non-transient errors are returned on
/// the first occurrence.
pub async fn with_retry<F, Fut, T>(
    tracker: &RequestTracker,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, FeedError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => {
                tracker.record_success();
                return Ok(val);
            }
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                tracker.record_retry();
                let wait = policy.backoff_for(attempt) + policy.jitter();
                tracing::warn!(
                    "Feed request failed ({}), retry {}/{} in {:?}",
                    e,
                    attempt + 1,
                    policy.max_retries,
                    wait
                );
                tracker.record_backoff(wait);
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                tracker.record_failure();
                return Err(e);
            }
        }
    }
}
