//! Resource fetchers
//!
//! Primary fetchers (issues, pulls, releases) page a repository listing and
//! store every item. Secondary fetchers (reviews, issue events) walk what is
//! already in the store and fetch per-document sub-resources.

use crate::document::Collection;
use crate::github::remote::{listing_url, repository_url};
use crate::github::{fetch_document, Fetched, GitHubApi, RateGovernor, RateLimit, RemotePages};
use crate::store::{DocumentQuery, MirrorStore, UpsertOutcome, DEFAULT_PAGE_SIZE};
use crate::{MirrorError, Result};
use serde::Serialize;
use serde_json::Value;

/// Counters for one fetcher run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Documents received from GitHub
    pub fetched: u64,
    pub stored: u64,
    /// Documents dropped for lack of a canonical key
    pub unresolved: u64,
}

impl FetchStats {
    pub fn record(&mut self, outcome: &UpsertOutcome) {
        self.fetched += 1;
        match outcome {
            UpsertOutcome::Stored(_) => self.stored += 1,
            UpsertOutcome::Unresolved => self.unresolved += 1,
        }
    }

    pub fn merge(&mut self, other: &FetchStats) {
        self.fetched += other.fetched;
        self.stored += other.stored;
        self.unresolved += other.unresolved;
    }
}

/// Everything a fetcher needs, borrowed from the orchestrator
pub struct SyncContext<'a, A: GitHubApi + ?Sized> {
    pub api: &'a A,
    pub store: &'a MirrorStore,
    pub governor: &'a RateGovernor,
    pub api_url: &'a str,
}

impl<'a, A: GitHubApi + ?Sized> SyncContext<'a, A> {
    pub fn new(
        api: &'a A,
        store: &'a MirrorStore,
        governor: &'a RateGovernor,
        api_url: &'a str,
    ) -> Self {
        Self {
            api,
            store,
            governor,
            api_url,
        }
    }

    /// `GET /repos/{full_name}`; a missing repository is an error here
    pub async fn resolve_repository(&self, full_name: &str) -> Result<Value> {
        let url = repository_url(self.api_url, full_name);
        let lookup = fetch_document(self.api, &url).await?;
        self.observe(lookup.rate_limit).await;
        match lookup.body {
            Fetched::Found(body) => Ok(body),
            Fetched::Absent => Err(MirrorError::NotFound(format!("repository {}", full_name))),
        }
    }

    /// Check the rate window reported by a response, if it carried one
    pub(crate) async fn observe(&self, limit: Option<RateLimit>) {
        if let Some(limit) = limit {
            self.governor.observe(&limit).await;
        }
    }

    pub async fn fetch_issues(&self, full_name: &str) -> Result<FetchStats> {
        self.fetch_listing(full_name, "issues", true).await
    }

    pub async fn fetch_pulls(&self, full_name: &str) -> Result<FetchStats> {
        self.fetch_listing(full_name, "pulls", true).await
    }

    pub async fn fetch_releases(&self, full_name: &str) -> Result<FetchStats> {
        self.fetch_listing(full_name, "releases", false).await
    }

    async fn fetch_listing(
        &self,
        full_name: &str,
        resource: &str,
        all_states: bool,
    ) -> Result<FetchStats> {
        let repository = self.resolve_repository(full_name).await?;
        let base = repository
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| repository_url(self.api_url, full_name));

        let stats = self
            .store_listing(&listing_url(&base, resource, all_states))
            .await?;

        tracing::info!(
            repository = full_name,
            resource,
            fetched = stats.fetched,
            stored = stats.stored,
            "Fetched listing"
        );
        Ok(stats)
    }

    /// Upsert every item of a remote listing, checking the rate window after
    /// each response, empty and absent ones included
    async fn store_listing(&self, url: &str) -> Result<FetchStats> {
        let mut stats = FetchStats::default();
        let mut pages = RemotePages::new(self.api, url);

        while let Some(page) = pages.next_page().await? {
            for item in &page.items {
                stats.record(&self.store.upsert(item)?);
            }
            self.observe(page.rate_limit).await;
        }

        if pages.was_absent() {
            tracing::debug!(url, "Listing absent upstream");
            self.observe(pages.rate_limit()).await;
        }
        Ok(stats)
    }

    /// Reviews for every stored pull whose base repository is `full_name`
    pub async fn fetch_reviews(&self, full_name: &str) -> Result<FetchStats> {
        let query =
            DocumentQuery::new(Collection::Pulls).field_eq("base.repo.full_name", full_name);

        let mut stats = FetchStats::default();
        for page in self.store.pages(query, DEFAULT_PAGE_SIZE) {
            for pull in page? {
                let Some(pull_url) = pull.body.get("url").and_then(Value::as_str) else {
                    tracing::warn!(key = %pull.key, "Stored pull has no url, skipping reviews");
                    continue;
                };
                let reviews = self.store_listing(&listing_url(pull_url, "reviews", false)).await?;
                stats.merge(&reviews);
            }
        }

        tracing::info!(repository = full_name, fetched = stats.fetched, "Fetched reviews");
        Ok(stats)
    }

    /// Refresh the `events` array of every stored issue of `full_name`
    pub async fn fetch_issue_events(&self, full_name: &str) -> Result<FetchStats> {
        let pattern = format!("/{}$", regex::escape(full_name));
        let query = DocumentQuery::new(Collection::Issues).field_matches("repository_url", pattern);

        let mut stats = FetchStats::default();
        for page in self.store.pages(query, DEFAULT_PAGE_SIZE) {
            for stored in page? {
                let mut issue = stored.body;
                collect_issue_events(self.api, &mut issue, Some(self.governor)).await?;
                stats.record(&self.store.upsert(&issue)?);
            }
        }

        tracing::info!(repository = full_name, issues = stats.fetched, "Fetched issue events");
        Ok(stats)
    }
}

/// Replace `issue.events` with the full event history.
///
/// An absent event listing yields an empty array. With a governor, the rate
/// window is checked after every response.
pub async fn collect_issue_events<A: GitHubApi + ?Sized>(
    api: &A,
    issue: &mut Value,
    governor: Option<&RateGovernor>,
) -> Result<()> {
    let issue_url = issue
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| MirrorError::Parse("Issue has no url".to_string()))?;

    let mut events = Vec::new();
    let mut pages = RemotePages::new(api, listing_url(issue_url, "events", false));
    while let Some(page) = pages.next_page().await? {
        events.extend(page.items);
        if let (Some(governor), Some(limit)) = (governor, page.rate_limit) {
            governor.observe(&limit).await;
        }
    }
    if pages.was_absent() {
        if let (Some(governor), Some(limit)) = (governor, pages.rate_limit()) {
            governor.observe(&limit).await;
        }
    }

    let object = issue
        .as_object_mut()
        .ok_or_else(|| MirrorError::Parse("Issue is not a JSON object".to_string()))?;
    object.insert("events".to_string(), Value::Array(events));
    Ok(())
}
