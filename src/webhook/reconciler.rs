//! Push-path reconciliation
//!
//! A delivery only says that something changed. The authoritative body is
//! re-fetched from the API (where one exists) and stored like a bulk-synced
//! document. Every delivery ends either stored or discarded.

use crate::document::{self, DocType, Identity};
use crate::github::{fetch_document, Fetched, GitHubApi};
use crate::store::MirrorStore;
use crate::sync::collect_issue_events;
use crate::{metrics, Result};
use serde_json::Value;

/// `X-GitHub-Event` values the mirror understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Release,
    Issues,
    PullRequest,
    PullRequestReview,
    Installation,
    Other(String),
}

impl WebhookEvent {
    pub fn parse(name: &str) -> Self {
        match name {
            "release" => WebhookEvent::Release,
            "issues" => WebhookEvent::Issues,
            "pull_request" => WebhookEvent::PullRequest,
            "pull_request_review" => WebhookEvent::PullRequestReview,
            "installation" => WebhookEvent::Installation,
            other => WebhookEvent::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WebhookEvent::Release => "release",
            WebhookEvent::Issues => "issues",
            WebhookEvent::PullRequest => "pull_request",
            WebhookEvent::PullRequestReview => "pull_request_review",
            WebhookEvent::Installation => "installation",
            WebhookEvent::Other(name) => name,
        }
    }
}

/// A document ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDelivery {
    pub identity: Identity,
    pub document: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Stored(Identity),
    Discarded,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Stored(_) => "stored",
            DeliveryOutcome::Discarded => "discarded",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Stored(identity) => Some(&identity.key),
            DeliveryOutcome::Discarded => None,
        }
    }
}

pub struct Reconciler<'a, A: GitHubApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: GitHubApi + ?Sized> Reconciler<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Fetch and identify the document a delivery refers to.
    ///
    /// Touches the API only. `None` means the delivery is discarded. The
    /// rate window is not consulted on this path.
    pub async fn resolve_delivery(
        &self,
        event: &WebhookEvent,
        payload: &Value,
    ) -> Result<Option<ResolvedDelivery>> {
        let fetched = match event {
            WebhookEvent::Release => self.refetch(payload, "release").await?,
            WebhookEvent::PullRequest => self.refetch(payload, "pull_request").await?,
            WebhookEvent::Issues => self.refetch_issue(payload).await?,
            WebhookEvent::PullRequestReview => {
                let review = payload.get("review");
                return Ok(review.and_then(|r| {
                    resolved(r, document::resolve_as(r, DocType::PullRequest))
                }));
            }
            WebhookEvent::Installation => payload.get("installation").cloned(),
            WebhookEvent::Other(name) => {
                tracing::debug!(event = %name, "Ignoring unhandled webhook event");
                return Ok(None);
            }
        };

        Ok(fetched.and_then(|doc| resolved(&doc, document::resolve(&doc))))
    }

    /// GET `payload[fragment].url`; `None` when absent upstream
    async fn refetch(&self, payload: &Value, fragment: &str) -> Result<Option<Value>> {
        let Some(url) = fragment_url(payload, fragment) else {
            tracing::warn!(fragment, "Delivery has no document url");
            return Ok(None);
        };

        match fetch_document(self.api, url).await?.body {
            Fetched::Found(body) => Ok(Some(body)),
            Fetched::Absent => {
                tracing::info!(url, "Document no longer exists upstream");
                Ok(None)
            }
        }
    }

    /// Issues fall back to the delivered fragment and always carry `events`
    async fn refetch_issue(&self, payload: &Value) -> Result<Option<Value>> {
        let Some(fragment) = payload.get("issue") else {
            return Ok(None);
        };

        let mut issue = match self.refetch(payload, "issue").await? {
            Some(fresh) => fresh,
            None => fragment.clone(),
        };
        if issue.get("url").and_then(Value::as_str).is_none() {
            return Ok(Some(issue));
        }

        collect_issue_events(self.api, &mut issue, None).await?;
        Ok(Some(issue))
    }

    /// Resolve then store
    pub async fn reconcile(
        &self,
        store: &MirrorStore,
        event: &WebhookEvent,
        payload: &Value,
    ) -> Result<DeliveryOutcome> {
        let delivery = self.resolve_delivery(event, payload).await?;
        apply(store, event, delivery)
    }
}

fn fragment_url<'p>(payload: &'p Value, fragment: &str) -> Option<&'p str> {
    payload.get(fragment)?.get("url")?.as_str()
}

fn resolved(document: &Value, identity: Option<Identity>) -> Option<ResolvedDelivery> {
    match identity {
        Some(identity) => Some(ResolvedDelivery {
            identity,
            document: document.clone(),
        }),
        None => {
            tracing::warn!("Delivered document has no resolvable identity");
            metrics::record_unresolved("webhook");
            None
        }
    }
}

/// Write a resolved delivery and record its terminal state
pub fn apply(
    store: &MirrorStore,
    event: &WebhookEvent,
    delivery: Option<ResolvedDelivery>,
) -> Result<DeliveryOutcome> {
    let outcome = match delivery {
        Some(ResolvedDelivery { identity, document }) => {
            store.put(&identity, &document)?;
            DeliveryOutcome::Stored(identity)
        }
        None => DeliveryOutcome::Discarded,
    };

    tracing::info!(
        event = event.as_str(),
        outcome = outcome.as_str(),
        key = outcome.key().unwrap_or("-"),
        "Webhook delivery reconciled"
    );
    metrics::record_delivery(event.as_str(), outcome.as_str());
    Ok(outcome)
}
