//! Retry with exponential backoff for GitHub requests
//!
//! Transient failures (connection resets, timeouts, 5xx, secondary rate
//! limits) are retried with capped exponential backoff plus jitter. The
//! primary rate window is handled separately by [`super::RateGovernor`].

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for a single logical request
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single delay, including server-requested ones
    pub max_backoff: Duration,

    /// Growth factor between attempts
    pub multiplier: f64,

    /// Stretch each delay by up to 25%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (zero-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exponential = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_backoff.as_secs_f64());

        if self.jitter {
            Duration::from_secs_f64(capped * (1.0 + jitter_fraction() * 0.25))
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

/// Cheap 0.0..1.0 jitter from the clock's sub-second nanos
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry with the configured backoff
    Retry,
    /// Retry after a server-provided delay
    RetryAfter(Duration),
    /// Permanent failure
    NoRetry,
}

/// Errors that know whether they are worth retrying
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Run `operation` until it succeeds, fails permanently, or runs out of retries.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let delay = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation = operation_name, attempt, error = %err, "Permanent failure");
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Giving up after retries"
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(requested) => requested.min(config.max_backoff),
            RetryDecision::Retry => config.backoff_duration(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_retries + 1,
            backoff_secs = delay.as_secs_f64(),
            error = %err,
            "Retrying GitHub request"
        );

        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Flaky {
        Reset,
        SecondaryLimit(Duration),
        BadCredentials,
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl RetryableError for Flaky {
        fn retry_decision(&self) -> RetryDecision {
            match self {
                Flaky::Reset => RetryDecision::Retry,
                Flaky::SecondaryLimit(wait) => RetryDecision::RetryAfter(*wait),
                Flaky::BadCredentials => RetryDecision::NoRetry,
            }
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(20),
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_secs(2));
        assert_eq!(config.backoff_duration(1), Duration::from_secs(4));
        assert_eq!(config.backoff_duration(2), Duration::from_secs(8));
        assert_eq!(config.backoff_duration(5), Duration::from_secs(20));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(4),
            jitter: true,
            ..Default::default()
        };
        let delay = config.backoff_duration(0);
        assert!(delay >= Duration::from_secs(4));
        assert!(delay <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut calls = 0;
        let result: Result<u32, Flaky> = with_retry(&fast(), "test", || {
            calls += 1;
            let current = calls;
            async move {
                if current < 3 {
                    Err(Flaky::Reset)
                } else {
                    Ok(current)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), Flaky> = with_retry(&fast(), "test", || {
            calls += 1;
            async { Err(Flaky::Reset) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let mut calls = 0;
        let result: Result<(), Flaky> = with_retry(&RetryConfig::default(), "test", || {
            calls += 1;
            async { Err(Flaky::BadCredentials) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_requested_delay_is_capped() {
        let config = RetryConfig {
            max_retries: 1,
            max_backoff: Duration::from_secs(30),
            ..Default::default()
        };
        let mut calls = 0;
        let started = tokio::time::Instant::now();
        let result: Result<u32, Flaky> = with_retry(&config, "test", || {
            calls += 1;
            let current = calls;
            async move {
                if current == 1 {
                    Err(Flaky::SecondaryLimit(Duration::from_secs(600)))
                } else {
                    Ok(current)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(600));
    }
}
