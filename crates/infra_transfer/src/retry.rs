//! Bounded retry for file store operations
//!
//! Each attempt runs under its own timeout. Only transient store errors are
//! retried; everything else is returned after the first attempt. Between
//! attempts the policy sleeps for an exponentially growing, randomly
//! jittered delay capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::StoreError;

/// Retry configuration for transfer operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// The operation did not succeed within the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub attempts: u32,
    pub last_error: StoreError,
}

impl RetryPolicy {
    /// Un-jittered delay after the given (1-based) failed attempt
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered delay in `[ceiling / 2, ceiling]`
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let millis = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        Duration::from_millis(millis)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `operation` and `target` only label the log lines, e.g. `"upload"`
    /// and the destination path or bucket URL.
    pub async fn run<T, F, Fut>(&self, operation: &str, target: &str, mut op: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    operation: format!("{operation} {target}"),
                    duration_ms: self.attempt_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(value) => {
                    info!(operation, target, attempt, outcome = "success", "Transfer attempt finished");
                    return Ok(value);
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.jittered_delay(attempt);
                    warn!(
                        operation,
                        target,
                        attempt,
                        outcome = "retrying",
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transfer attempt failed"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(
                        operation,
                        target,
                        attempt,
                        outcome = "failed",
                        transient = error.is_transient(),
                        error = %error,
                        "Transfer attempt failed"
                    );
                    return Err(RetryFailure {
                        attempts: attempt,
                        last_error: error,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_backoff_ceiling_doubles_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_ceiling(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let delay = policy.jittered_delay(2);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn test_two_transient_failures_then_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("upload", "outbound/ANTHEM_20250101", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::Connection("reset".into()))
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_three_transient_failures_exhaust() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("upload", "bucket", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Server { status: 503, message: "busy".into() })
            })
            .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run("download", "inbound/x", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Unauthorized("denied".into()))
            })
            .await;
        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_retries() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("upload", "slow", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok::<_, StoreError>(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
