//! Draft release reaper
//!
//! Draft releases are stored under a placeholder `untagged-*` tag. When the
//! draft is deleted upstream nothing ever tells the mirror, so stored drafts
//! are re-checked one by one.

use super::fetch::SyncContext;
use crate::document::{self, Collection};
use crate::github::remote::release_url;
use crate::github::{fetch_document, Fetched, GitHubApi};
use crate::store::{DocumentQuery, StoredDocument, DEFAULT_PAGE_SIZE};
use crate::{metrics, Result};
use serde::Serialize;
use serde_json::Value;

const DRAFT_TAG_PATTERN: &str = "^untagged-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapStats {
    pub checked: u64,
    pub removed: u64,
    pub refreshed: u64,
}

impl<A: GitHubApi + ?Sized> SyncContext<'_, A> {
    /// Re-fetch every stored draft of `full_name`; drop the ones that are gone
    pub async fn reap_drafts(&self, full_name: &str) -> Result<ReapStats> {
        let query = DocumentQuery::new(Collection::Releases)
            .field_matches(
                "url",
                format!("/repos/{}/releases/\\d+$", regex::escape(full_name)),
            )
            .field_matches("tag_name", DRAFT_TAG_PATTERN);

        // Collected up front: removing rows mid-scan would shift later pages.
        let mut drafts: Vec<StoredDocument> = Vec::new();
        for page in self.store.pages(query, DEFAULT_PAGE_SIZE) {
            drafts.extend(page?);
        }

        let mut stats = ReapStats::default();
        for draft in drafts {
            stats.checked += 1;

            let Some(id) = draft.body.get("id").and_then(Value::as_u64) else {
                tracing::warn!(key = %draft.key, "Stored draft has no id, leaving it");
                continue;
            };

            let url = release_url(self.api_url, full_name, id);
            let lookup = fetch_document(self.api, &url).await?;
            self.observe(lookup.rate_limit).await;
            match lookup.body {
                Fetched::Absent => {
                    self.store.remove(Collection::Releases, &draft.key)?;
                    metrics::record_draft_removed();
                    tracing::info!(key = %draft.key, "Removed discarded draft release");
                    stats.removed += 1;
                }
                Fetched::Found(fresh) => {
                    let Some(identity) = document::resolve(&fresh) else {
                        tracing::warn!(key = %draft.key, "Refetched draft is unresolvable, leaving it");
                        metrics::record_unresolved("drafts");
                        continue;
                    };

                    self.store.put(&identity, &fresh)?;
                    if identity.key != draft.key {
                        self.store.remove(Collection::Releases, &draft.key)?;
                        tracing::info!(
                            old = %draft.key,
                            new = %identity.key,
                            "Draft release was published under a new tag"
                        );
                    }
                    stats.refreshed += 1;
                }
            }
        }

        tracing::info!(
            repository = full_name,
            checked = stats.checked,
            removed = stats.removed,
            "Reaped draft releases"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Collection;
    use crate::github::{ApiResponse, RateGovernor, RateLimit};
    use crate::store::MirrorStore;
    use crate::sync::fetch::SyncContext;
    use crate::test_utils::ScriptedApi;
    use serde_json::{json, Value};

    const API: &str = "https://api.github.com";

    fn release(repo: &str, id: u64, tag: &str) -> Value {
        json!({
            "url": format!("https://api.github.com/repos/{}/releases/{}", repo, id),
            "id": id,
            "tag_name": tag
        })
    }

    #[tokio::test]
    async fn test_absent_draft_is_removed() {
        let api = ScriptedApi::new().with_not_found("https://api.github.com/repos/acme/widgets/releases/10");
        let store = MirrorStore::open_in_memory().unwrap();
        store.upsert(&release("acme/widgets", 10, "untagged-abc")).unwrap();
        store.upsert(&release("acme/widgets", 11, "v1.0.0")).unwrap();
        let governor = RateGovernor::default();
        let ctx = SyncContext::new(&api, &store, &governor, API);

        let stats = ctx.reap_drafts("acme/widgets").await.unwrap();

        assert_eq!(stats.checked, 1);
        assert_eq!(stats.removed, 1);
        assert!(store
            .get(Collection::Releases, "release/acme/widgets/untagged-abc")
            .unwrap()
            .is_none());
        assert!(store
            .get(Collection::Releases, "release/acme/widgets/v1.0.0")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_existing_draft_is_refreshed() {
        let mut fresh = release("acme/widgets", 10, "untagged-abc");
        fresh["body"] = json!("updated notes");
        let api = ScriptedApi::new().with_json("https://api.github.com/repos/acme/widgets/releases/10", fresh);
        let store = MirrorStore::open_in_memory().unwrap();
        store.upsert(&release("acme/widgets", 10, "untagged-abc")).unwrap();
        let governor = RateGovernor::default();
        let ctx = SyncContext::new(&api, &store, &governor, API);

        let stats = ctx.reap_drafts("acme/widgets").await.unwrap();

        assert_eq!(stats.refreshed, 1);
        let stored = store
            .get(Collection::Releases, "release/acme/widgets/untagged-abc")
            .unwrap()
            .unwrap();
        assert_eq!(stored["body"], "updated notes");
    }

    #[tokio::test]
    async fn test_published_draft_moves_to_new_key() {
        let api = ScriptedApi::new().with_json(
            "https://api.github.com/repos/acme/widgets/releases/10",
            release("acme/widgets", 10, "v2.0.0"),
        );
        let store = MirrorStore::open_in_memory().unwrap();
        store.upsert(&release("acme/widgets", 10, "untagged-abc")).unwrap();
        let governor = RateGovernor::default();
        let ctx = SyncContext::new(&api, &store, &governor, API);

        ctx.reap_drafts("acme/widgets").await.unwrap();

        assert_eq!(store.count(Collection::Releases).unwrap(), 1);
        assert!(store
            .get(Collection::Releases, "release/acme/widgets/v2.0.0")
            .unwrap()
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_draft_still_checks_rate_window() {
        let reset = chrono::Utc::now().timestamp() + 10;
        let api = ScriptedApi::new().with_response(
            "https://api.github.com/repos/acme/widgets/releases/10",
            ApiResponse {
                rate_limit: Some(RateLimit { remaining: 0, reset }),
                ..ApiResponse::not_found()
            },
        );
        let store = MirrorStore::open_in_memory().unwrap();
        store.upsert(&release("acme/widgets", 10, "untagged-abc")).unwrap();
        let governor = RateGovernor::default();
        let ctx = SyncContext::new(&api, &store, &governor, API);

        let started = tokio::time::Instant::now();
        let stats = ctx.reap_drafts("acme/widgets").await.unwrap();

        assert_eq!(stats.removed, 1);
        assert!(started.elapsed() >= std::time::Duration::from_secs(125));
    }

    #[tokio::test]
    async fn test_other_repository_drafts_are_ignored() {
        let api = ScriptedApi::new();
        let store = MirrorStore::open_in_memory().unwrap();
        store.upsert(&release("acme/widgets-2", 12, "untagged-xyz")).unwrap();
        let governor = RateGovernor::default();
        let ctx = SyncContext::new(&api, &store, &governor, API);

        let stats = ctx.reap_drafts("acme/widgets").await.unwrap();

        assert_eq!(stats.checked, 0);
        assert!(api.calls().is_empty());
    }
}
