//! Retry with exponential backoff for guide builds
//!
//! A failed channel build is almost always transient (the lineup source
//! hiccuped, a redirect target was mid-update), so builds run under a retry
//! policy with both an attempt cap and a total elapsed-time budget. The loop
//! never aborts the process; exhaustion surfaces as the last error.

use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::utils::jitter::generate_jitter_percent;

/// Configuration for build retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (first try included)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap for any single backoff delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Total time budget across all retries; exceeding it stops the loop
    pub total_budget: Duration,
    /// Jitter applied to each delay, as a percentage of the delay
    pub jitter_percent: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            total_budget: Duration::from_secs(30),
            jitter_percent: 25,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = (exp as u64).min(self.max_delay.as_millis() as u64);
        let jitter = generate_jitter_percent(capped, self.jitter_percent);
        Duration::from_millis(capped + jitter)
    }
}

/// Execute an operation under a retry policy
///
/// Every error is treated as retryable; the caller decides which failures
/// reach this wrapper. Returns the first success or the last error once
/// attempts or the time budget are exhausted.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = Instant::now();
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Operation '{}' succeeded on attempt {}/{}",
                        operation_name, attempt, policy.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                warn!(
                    "Operation '{}' failed on attempt {}/{}: {}",
                    operation_name, attempt, policy.max_attempts, err
                );
                last_error = Some(err);

                if attempt < policy.max_attempts {
                    let delay = policy.delay_for_attempt(attempt);
                    if started.elapsed() + delay > policy.total_budget {
                        warn!(
                            "Operation '{}' exceeded retry budget of {:?} after {} attempts, giving up",
                            operation_name, policy.total_budget, attempt
                        );
                        break;
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    // max_attempts >= 1, so at least one attempt ran and recorded an error
    Err(last_error.expect("retry loop exited without running an attempt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            total_budget: Duration::from_secs(1),
            jitter_percent: 0,
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(
            &fast_policy(),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("boom {n}")) } else { Ok(n) }
            },
            "test op",
        )
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn surfaces_last_error_when_exhausted() {
        let result: Result<(), String> =
            with_retry(&fast_policy(), || async { Err("always".to_string()) }, "test op").await;
        assert_eq!(result.unwrap_err(), "always");
    }

    #[tokio::test]
    async fn budget_stops_the_loop_early() {
        let policy = RetryPolicy {
            max_attempts: 100,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 1.0,
            total_budget: Duration::from_millis(120),
            jitter_percent: 0,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(
            &policy,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            },
            "budgeted op",
        )
        .await;
        assert!(result.is_err());
        assert!(calls.load(Ordering::SeqCst) < 100);
    }
}
