//! Typed views over raw API responses
//!
//! Turns status codes into [`Fetched`] and walks `Link`-paginated listings.

use super::client::GitHubApi;
use super::rate::RateLimit;
use crate::{MirrorError, Result};
use serde_json::Value;

const PER_PAGE: u32 = 100;

/// A remote lookup that may legitimately find nothing
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Found(T),
    Absent,
}

impl<T> Fetched<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Fetched::Absent)
    }
}

/// A single document lookup. The rate window is reported whether or not
/// the document was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub body: Fetched<Value>,
    pub rate_limit: Option<RateLimit>,
}

/// GET one document
pub async fn fetch_document<A: GitHubApi + ?Sized>(api: &A, url: &str) -> Result<Document> {
    let response = api.get(url).await?;
    let body = if response.is_not_found() {
        tracing::debug!(url, "Document absent upstream");
        Fetched::Absent
    } else {
        Fetched::Found(response.body)
    };
    Ok(Document {
        body,
        rate_limit: response.rate_limit,
    })
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub rate_limit: Option<RateLimit>,
}

/// Follows `rel="next"` links until the listing is exhausted
pub struct RemotePages<'a, A: GitHubApi + ?Sized> {
    api: &'a A,
    next: Option<String>,
    absent: bool,
    rate_limit: Option<RateLimit>,
}

impl<'a, A: GitHubApi + ?Sized> RemotePages<'a, A> {
    pub fn new(api: &'a A, url: impl Into<String>) -> Self {
        Self {
            api,
            next: Some(url.into()),
            absent: false,
            rate_limit: None,
        }
    }

    /// Next page, or `None` once the listing is exhausted or absent
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let response = self.api.get(&url).await?;
        self.rate_limit = response.rate_limit;
        if response.is_not_found() {
            self.absent = true;
            return Ok(None);
        }

        let items = match response.body {
            Value::Array(items) => items,
            other => {
                return Err(MirrorError::Parse(format!(
                    "Expected a JSON array from {}, got {}",
                    url,
                    json_kind(&other)
                )))
            }
        };

        self.next = response.next;
        Ok(Some(Page {
            items,
            rate_limit: response.rate_limit,
        }))
    }

    /// Whether the listing itself was not found
    pub fn was_absent(&self) -> bool {
        self.absent
    }

    /// Rate window reported by the most recent response, absent ones included
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn repository_url(api_url: &str, full_name: &str) -> String {
    format!("{}/repos/{}", api_url.trim_end_matches('/'), full_name)
}

pub fn organization_repos_url(api_url: &str, organization: &str) -> String {
    format!(
        "{}/orgs/{}/repos?per_page={}",
        api_url.trim_end_matches('/'),
        organization,
        PER_PAGE
    )
}

pub fn release_url(api_url: &str, full_name: &str, id: u64) -> String {
    format!("{}/releases/{}", repository_url(api_url, full_name), id)
}

/// Listing under a repository or document API url, e.g. `{repo.url}/issues`
pub fn listing_url(base: &str, resource: &str, all_states: bool) -> String {
    let state = if all_states { "state=all&" } else { "" };
    format!(
        "{}/{}?{}per_page={}",
        base.trim_end_matches('/'),
        resource,
        state,
        PER_PAGE
    )
}
