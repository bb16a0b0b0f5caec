//! Shared fixtures for integration tests

use async_trait::async_trait;
use ghmirror::github::{ApiResponse, GitHubApi};
use ghmirror::{MirrorError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub const API: &str = "https://api.github.com";

/// In-memory GitHub: canned responses by exact URL
#[derive(Default)]
pub struct FakeGitHub {
    responses: Mutex<HashMap<String, ApiResponse>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ApiResponse::ok(body));
    }

    pub fn remove(&self, url: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ApiResponse::not_found());
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| MirrorError::Api {
                status: 500,
                url: url.to_string(),
                body: "unscripted".to_string(),
            })
    }
}

pub fn repo_url(name: &str) -> String {
    format!("{}/repos/acme/{}", API, name)
}

/// One repository with an issue, a pull with one review, a release and a draft
pub fn populated_org(api: &FakeGitHub, name: &str) {
    let repo = repo_url(name);
    let full_name = format!("acme/{}", name);

    api.set(
        &format!("{}/orgs/acme/repos?per_page=100", API),
        json!([{ "name": name, "full_name": full_name, "url": repo }]),
    );
    api.set(&repo, json!({ "name": name, "full_name": full_name, "url": repo }));

    api.set(
        &format!("{}/issues?state=all&per_page=100", repo),
        json!([issue(name, 1, "open")]),
    );
    api.set(&format!("{}/issues/1/events?per_page=100", repo), json!([{ "event": "labeled" }]));

    api.set(
        &format!("{}/pulls?state=all&per_page=100", repo),
        json!([pull(name, 2, "open")]),
    );
    api.set(
        &format!("{}/pulls/2/reviews?per_page=100", repo),
        json!([{
            "id": 900,
            "html_url": format!("https://github.com/acme/{}/pull/2#pullrequestreview-900", name),
            "state": "APPROVED"
        }]),
    );

    api.set(
        &format!("{}/releases?per_page=100", repo),
        json!([release(name, 10, "v1.0.0"), release(name, 11, "untagged-0a1b2c")]),
    );
    api.set(&format!("{}/releases/10", repo), release(name, 10, "v1.0.0"));
    api.set(&format!("{}/releases/11", repo), release(name, 11, "untagged-0a1b2c"));
}

pub fn issue(repo: &str, number: u64, state: &str) -> Value {
    json!({
        "url": format!("{}/issues/{}", repo_url(repo), number),
        "repository_url": repo_url(repo),
        "html_url": format!("https://github.com/acme/{}/issues/{}", repo, number),
        "number": number,
        "state": state
    })
}

pub fn pull(repo: &str, number: u64, state: &str) -> Value {
    json!({
        "url": format!("{}/pulls/{}", repo_url(repo), number),
        "number": number,
        "state": state,
        "base": { "repo": { "full_name": format!("acme/{}", repo) } }
    })
}

pub fn release(repo: &str, id: u64, tag: &str) -> Value {
    json!({
        "url": format!("{}/releases/{}", repo_url(repo), id),
        "id": id,
        "tag_name": tag,
        "draft": tag.starts_with("untagged-")
    })
}
