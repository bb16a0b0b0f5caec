//! Rate governor for the bulk sync path
//!
//! GitHub advertises the remaining budget of the current window in every
//! response. Once it drops to the threshold, the fetch loop sleeps until the
//! window resets plus a safety margin.

use crate::config::RateLimitConfig;
use crate::metrics;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate window as reported by one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls left in the current window
    pub remaining: u64,
    /// Window reset, seconds since the Unix epoch
    pub reset: i64,
}

impl RateLimit {
    /// Read the rate headers; `None` unless both are present and numeric
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_value(headers, REMAINING_HEADER)?;
        let reset = header_value(headers, RESET_HEADER)?;
        Some(Self { remaining, reset })
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[derive(Debug, Clone)]
pub struct RateGovernor {
    threshold: u64,
    safety_margin: Duration,
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

impl RateGovernor {
    pub fn new(threshold: u64, safety_margin: Duration) -> Self {
        Self {
            threshold,
            safety_margin,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.threshold, Duration::from_secs(config.safety_margin_secs))
    }

    /// How long to wait given `limit` observed at `now`, if at all
    pub fn wait_duration(&self, limit: &RateLimit, now: DateTime<Utc>) -> Option<Duration> {
        if limit.remaining > self.threshold {
            return None;
        }

        let margin = self.safety_margin.as_secs() as i64;
        let wait_secs = limit.reset + margin - now.timestamp();
        (wait_secs > 0).then(|| Duration::from_secs(wait_secs as u64))
    }

    /// Block the current task until the window has capacity again
    pub async fn observe(&self, limit: &RateLimit) {
        self.observe_at(limit, Utc::now()).await
    }

    pub async fn observe_at(&self, limit: &RateLimit, now: DateTime<Utc>) {
        let Some(wait) = self.wait_duration(limit, now) else {
            return;
        };

        let resume_at = Utc
            .timestamp_opt(limit.reset + self.safety_margin.as_secs() as i64, 0)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());

        tracing::warn!(
            remaining = limit.remaining,
            wait_secs = wait.as_secs(),
            resume_at = %resume_at,
            "Rate limit nearly exhausted, pausing"
        );
        metrics::record_rate_limit_wait();
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, HeaderValue::from_static("4999"));
        headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));

        assert_eq!(
            RateLimit::from_headers(&headers),
            Some(RateLimit {
                remaining: 4999,
                reset: 1_700_000_000
            })
        );
    }

    #[test]
    fn test_from_headers_missing_or_garbage() {
        let mut headers = HeaderMap::new();
        assert_eq!(RateLimit::from_headers(&headers), None);

        headers.insert(REMAINING_HEADER, HeaderValue::from_static("lots"));
        headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));
        assert_eq!(RateLimit::from_headers(&headers), None);
    }

    #[test]
    fn test_no_wait_above_threshold() {
        let governor = RateGovernor::default();
        let limit = RateLimit {
            remaining: 51,
            reset: 1_000,
        };
        assert_eq!(governor.wait_duration(&limit, at(900)), None);
    }

    #[test]
    fn test_wait_until_reset_plus_margin() {
        let governor = RateGovernor::default();
        let limit = RateLimit {
            remaining: 50,
            reset: 1_000,
        };
        assert_eq!(
            governor.wait_duration(&limit, at(990)),
            Some(Duration::from_secs(130))
        );
    }

    #[test]
    fn test_past_reset_returns_immediately() {
        let governor = RateGovernor::default();
        let limit = RateLimit {
            remaining: 0,
            reset: 1_000,
        };
        assert_eq!(governor.wait_duration(&limit, at(1_120)), None);
        assert_eq!(governor.wait_duration(&limit, at(5_000)), None);
    }

    #[test]
    fn test_configured_threshold() {
        let governor = RateGovernor::from_config(&RateLimitConfig {
            threshold: 500,
            safety_margin_secs: 0,
        });
        let limit = RateLimit {
            remaining: 400,
            reset: 1_010,
        };
        assert_eq!(
            governor.wait_duration(&limit, at(1_000)),
            Some(Duration::from_secs(10))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_sleeps_past_reset() {
        let governor = RateGovernor::default();
        let now = Utc::now();
        let limit = RateLimit {
            remaining: 10,
            reset: now.timestamp() + 5,
        };

        let started = tokio::time::Instant::now();
        governor.observe_at(&limit, now).await;
        assert!(started.elapsed() >= Duration::from_secs(125));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_plenty_remaining() {
        let governor = RateGovernor::default();
        let now = Utc::now();
        let limit = RateLimit {
            remaining: 200,
            reset: now.timestamp() + 3_600,
        };

        let started = tokio::time::Instant::now();
        governor.observe_at(&limit, now).await;
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
