//! Retry policy with exponential backoff and jitter
//!
//! The policy classifies each failure through [`Retryable`]:
//!
//! | Hint | Action |
//! |------|--------|
//! | `Fatal` | Give up immediately |
//! | `Backoff` | Wait `min(base * 2^attempt * jitter, max)` and retry |
//! | `SlowDown(d)` | Wait `d` and retry |
//!
//! Attempts are bounded by `max_attempts` in every case.

use crate::config::RetryConfig;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// How a failed attempt should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    /// Not worth retrying
    Fatal,
    /// Transient; retry after exponential backoff
    Backoff,
    /// The server asked us to slow down; retry after the given pause
    SlowDown(Duration),
}

/// Errors that know whether another attempt can succeed
pub trait Retryable {
    fn retry_hint(&self) -> RetryHint;
}

/// The last error of an operation that never succeeded
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts made, including the first
    pub attempts: u32,
    pub error: E,
}

/// Bounded retry schedule shared by every page fetch
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_min: config.jitter_min,
            jitter_max: config.jitter_max,
            rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms),
        }
    }

    /// Un-jittered exponential delay after the given zero-based attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Multiplies a delay by a random factor in `[jitter_min, jitter_max]`
    pub fn jittered(&self, delay: Duration) -> Duration {
        let factor = if self.jitter_min < self.jitter_max {
            rand::thread_rng().gen_range(self.jitter_min..=self.jitter_max)
        } else {
            self.jitter_min
        };
        Duration::from_secs_f64(delay.as_secs_f64() * factor.max(0.0))
    }

    /// Jittered and capped wait after the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jittered(self.backoff(attempt)).min(self.max_delay)
    }

    /// Pause after a rate-limit response
    ///
    /// Honors a server-provided `Retry-After` when it asks for longer than
    /// the configured minimum.
    pub fn rate_limit_pause(&self, retry_after: Option<Duration>) -> Duration {
        let floor = retry_after
            .map(|d| d.max(self.rate_limit_delay))
            .unwrap_or(self.rate_limit_delay);
        let cap = self.max_delay.max(self.rate_limit_delay);
        self.jittered(floor).min(cap)
    }

    /// Runs `op` until it succeeds, fails fatally, or attempts run out
    ///
    /// `op` receives the zero-based attempt number.
    ///
    /// # Returns
    ///
    /// * `Ok((value, attempts))` - The first successful result
    /// * `Err(RetryFailure)` - The last error and the attempts made
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<(T, u32), RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempt = 0;
        loop {
            let error = match op(attempt).await {
                Ok(value) => return Ok((value, attempt + 1)),
                Err(error) => error,
            };

            let made = attempt + 1;
            let wait = match error.retry_hint() {
                RetryHint::Fatal => {
                    tracing::debug!("Attempt {} failed permanently: {}", made, error);
                    return Err(RetryFailure {
                        attempts: made,
                        error,
                    });
                }
                _ if made >= self.max_attempts => {
                    tracing::debug!("Giving up after {} attempts: {}", made, error);
                    return Err(RetryFailure {
                        attempts: made,
                        error,
                    });
                }
                RetryHint::Backoff => self.delay_for(attempt),
                RetryHint::SlowDown(pause) => pause,
            };

            tracing::debug!(
                "Attempt {}/{} failed: {}; retrying in {:?}",
                made,
                self.max_attempts,
                error,
                wait
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(RetryHint);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl Retryable for TestError {
        fn retry_hint(&self) -> RetryHint {
            self.0
        }
    }

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_min: 1.0,
            jitter_max: 1.0,
            rate_limit_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_min: 1.0,
            jitter_max: 1.0,
            rate_limit_delay: Duration::from_secs(30),
        };

        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        assert_eq!(policy.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::default();
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let d = policy.jittered(base);
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_delay_never_exceeds_max() {
        let policy = RetryPolicy::default();
        for attempt in 0..10 {
            assert!(policy.delay_for(attempt) <= policy.max_delay);
        }
    }

    #[test]
    fn test_rate_limit_pause_honors_retry_after() {
        let mut policy = RetryPolicy::default();
        policy.jitter_min = 1.0;
        policy.jitter_max = 1.0;

        assert_eq!(policy.rate_limit_pause(None), Duration::from_secs(30));
        assert_eq!(
            policy.rate_limit_pause(Some(Duration::from_secs(45))),
            Duration::from_secs(45)
        );
        assert_eq!(
            policy.rate_limit_pause(Some(Duration::from_secs(1))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.rate_limit_pause(Some(Duration::from_secs(3600))),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_execute_succeeds_after_transient_failures() {
        let policy = instant_policy(5);
        let result = policy
            .execute(|attempt| async move {
                if attempt < 2 {
                    Err(TestError(RetryHint::Backoff))
                } else {
                    Ok("page")
                }
            })
            .await;

        let (value, attempts) = result.unwrap();
        assert_eq!(value, "page");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_execute_is_bounded() {
        let policy = instant_policy(4);
        let calls = AtomicU32::new(0);

        let result: Result<((), u32), _> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(RetryHint::Backoff)) }
            })
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_execute_stops_on_fatal() {
        let policy = instant_policy(5);
        let calls = AtomicU32::new(0);

        let result: Result<((), u32), _> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(RetryHint::Fatal)) }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_down_counts_as_attempt() {
        let policy = instant_policy(2);

        let result: Result<((), u32), _> = policy
            .execute(|_| async { Err(TestError(RetryHint::SlowDown(Duration::ZERO))) })
            .await;

        assert_eq!(result.unwrap_err().attempts, 2);
    }
}
