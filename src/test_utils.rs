//! Scripted GitHub API for unit tests

use crate::github::{ApiResponse, GitHubApi, RateLimit};
use crate::{MirrorError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Serves canned responses by exact URL and records every request.
/// Unscripted URLs fail with a 500 so missing fixtures are loud.
#[derive(Default)]
pub struct ScriptedApi {
    responses: HashMap<String, ApiResponse>,
    hooks: HashMap<String, Hook>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, response: ApiResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn with_json(self, url: &str, body: Value) -> Self {
        self.with_response(url, ApiResponse::ok(body))
    }

    pub fn with_page(self, url: &str, items: Value, next: Option<&str>) -> Self {
        let mut response = ApiResponse::ok(items);
        response.next = next.map(str::to_string);
        self.with_response(url, response)
    }

    pub fn with_rate_limited_page(self, url: &str, items: Value, rate_limit: RateLimit) -> Self {
        let mut response = ApiResponse::ok(items);
        response.rate_limit = Some(rate_limit);
        self.with_response(url, response)
    }

    pub fn with_not_found(self, url: &str) -> Self {
        self.with_response(url, ApiResponse::not_found())
    }

    /// Run `hook` whenever `url` is requested, before answering
    pub fn with_hook(mut self, url: &str, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.insert(url.to_string(), Arc::new(hook));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl GitHubApi for ScriptedApi {
    async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(hook) = self.hooks.get(url).cloned() {
            hook();
            tokio::task::yield_now().await;
        }

        self.responses.get(url).cloned().ok_or_else(|| MirrorError::Api {
            status: 500,
            url: url.to_string(),
            body: "unscripted".to_string(),
        })
    }
}
