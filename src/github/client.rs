//! GitHub REST client

use super::rate::RateLimit;
use super::retry::{with_retry, RetryConfig};
use crate::config::GitHubConfig;
use crate::{MirrorError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;

const USER_AGENT: &str = concat!("ghmirror/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// One decoded response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status; 404 covers both "not found" and "gone"
    pub status: u16,
    /// Parsed JSON body, `Null` for not-found
    pub body: Value,
    pub rate_limit: Option<RateLimit>,
    /// `rel="next"` target from the `Link` header
    pub next: Option<String>,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            rate_limit: None,
            next: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Value::Null,
            rate_limit: None,
            next: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Read-only access to the GitHub REST API.
///
/// Implementations return `Ok` with status 404 for missing resources and
/// reserve `Err` for failures the caller cannot interpret.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get(&self, url: &str) -> Result<ApiResponse>;
}

/// reqwest-backed [`GitHubApi`]
pub struct GitHubClient {
    client: Client,
    token: Option<String>,
    retry: RetryConfig,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
                headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
                headers.insert(
                    "x-github-api-version",
                    header::HeaderValue::from_static(API_VERSION),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            token: config.token.clone(),
            retry: RetryConfig::default(),
        })
    }

    async fn get_once(&self, url: &str) -> Result<ApiResponse> {
        let mut request = self.client.get(url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let rate_limit = RateLimit::from_headers(&headers);

        tracing::debug!(
            url,
            status = status.as_u16(),
            remaining = rate_limit.map(|r| r.remaining),
            "GitHub GET"
        );

        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(ApiResponse {
                status: 404,
                body: Value::Null,
                rate_limit,
                next: None,
            }),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if rate_limit.is_some_and(|r| r.remaining == 0) =>
            {
                let reset = rate_limit.map(|r| r.reset).unwrap_or_default();
                let wait = (reset - chrono::Utc::now().timestamp()).max(1) as u64;
                Err(MirrorError::RateLimited(wait))
            }
            s if s.is_success() => {
                let next = headers
                    .get(header::LINK)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_next_link);
                let body = response.json::<Value>().await?;
                Ok(ApiResponse {
                    status: s.as_u16(),
                    body,
                    rate_limit,
                    next,
                })
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(MirrorError::Api {
                    status: s.as_u16(),
                    url: url.to_string(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get(&self, url: &str) -> Result<ApiResponse> {
        with_retry(&self.retry, url, || self.get_once(url)).await
    }
}

/// Extract the `rel="next"` URL from a `Link` header
pub fn parse_next_link(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_next_link() {
        let link = r#"<https://api.github.com/repositories/1/issues?page=2>; rel="next", <https://api.github.com/repositories/1/issues?page=5>; rel="last""#;
        assert_eq!(
            parse_next_link(link),
            Some("https://api.github.com/repositories/1/issues?page=2".to_string())
        );
    }

    #[test]
    fn test_parse_next_link_last_page() {
        let link = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="first", <https://api.github.com/repositories/1/issues?page=4>; rel="prev""#;
        assert_eq!(parse_next_link(link), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_client_builds_from_config() {
        let mut config = GitHubConfig::default();
        assert!(GitHubClient::new(&config).is_ok());

        config.token = Some("ghp_test".to_string());
        config.api_url = "https://ghe.example.com/api/v3/".to_string();
        assert!(GitHubClient::new(&config).is_ok());
    }

    #[test]
    fn test_not_found_response() {
        let response = ApiResponse::not_found();
        assert!(response.is_not_found());
        assert!(response.body.is_null());
        assert!(!ApiResponse::ok(serde_json::json!({})).is_not_found());
    }
}
