//! Bulk sync orchestrator
//!
//! Walks an organization's repositories and runs the selected fetchers for
//! each one in a fixed order. Progress is published as [`SyncEvent`]s.

use super::drafts::ReapStats;
use super::fetch::{FetchStats, SyncContext};
use crate::config::MirrorConfig;
use crate::github::remote::organization_repos_url;
use crate::github::{GitHubApi, RateGovernor, RemotePages};
use crate::store::MirrorStore;
use crate::{metrics, MirrorError, Result};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Notify};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A sync step for one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    ReleaseDrafts,
    Releases,
    Pulls,
    PullReviews,
    Issues,
    IssueEvents,
}

impl Resource {
    /// Execution order. Reviews read stored pulls and events read stored
    /// issues, so each secondary step runs after its primary.
    pub const ORDERED: [Resource; 6] = [
        Resource::ReleaseDrafts,
        Resource::Releases,
        Resource::Pulls,
        Resource::PullReviews,
        Resource::Issues,
        Resource::IssueEvents,
    ];

    /// Everything except draft reaping
    pub fn defaults() -> Vec<Resource> {
        Self::ORDERED
            .into_iter()
            .filter(|r| *r != Resource::ReleaseDrafts)
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::ReleaseDrafts => "release-drafts",
            Resource::Releases => "releases",
            Resource::Pulls => "pulls",
            Resource::PullReviews => "pull-reviews",
            Resource::Issues => "issues",
            Resource::IssueEvents => "issue-events",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to sync
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub organization: String,
    /// Allow-list of `owner/name` or bare names; empty means all
    pub repositories: Vec<String>,
    /// Empty means [`Resource::defaults`]
    pub resources: Vec<Resource>,
}

impl SyncOptions {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            repositories: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_repositories(mut self, repositories: Vec<String>) -> Self {
        self.repositories = repositories;
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    /// Selected resources in execution order
    pub fn steps(&self) -> Vec<Resource> {
        let selected = if self.resources.is_empty() {
            Resource::defaults()
        } else {
            self.resources.clone()
        };
        Resource::ORDERED
            .into_iter()
            .filter(|r| selected.contains(r))
            .collect()
    }

    fn wants(&self, repository: &Value) -> bool {
        if self.repositories.is_empty() {
            return true;
        }
        let full_name = repository.get("full_name").and_then(Value::as_str);
        let name = repository.get("name").and_then(Value::as_str);
        self.repositories
            .iter()
            .any(|r| Some(r.as_str()) == full_name || Some(r.as_str()) == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StepStats {
    Fetch(FetchStats),
    Reap(ReapStats),
}

/// Progress notifications
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started {
        organization: String,
        repositories: usize,
    },
    RepoStarted {
        repository: String,
    },
    StepCompleted {
        repository: String,
        resource: Resource,
        stats: StepStats,
    },
    RepoCompleted {
        repository: String,
    },
    /// The user interrupted this repository; the run moves on
    RepoInterrupted {
        repository: String,
    },
    Finished {
        synced: usize,
        interrupted: usize,
    },
}

/// Summary of a whole run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub synced: Vec<String>,
    pub interrupted: Vec<String>,
    pub totals: BTreeMap<Resource, FetchStats>,
    pub drafts: ReapStats,
}

impl SyncReport {
    fn absorb(&mut self, steps: Vec<(Resource, StepStats)>) {
        for (resource, stats) in steps {
            match stats {
                StepStats::Fetch(fetch) => self.totals.entry(resource).or_default().merge(&fetch),
                StepStats::Reap(reap) => {
                    self.drafts.checked += reap.checked;
                    self.drafts.removed += reap.removed;
                    self.drafts.refreshed += reap.refreshed;
                }
            }
        }
    }
}

pub struct SyncOrchestrator<A: GitHubApi + ?Sized> {
    api: Arc<A>,
    store: MirrorStore,
    governor: RateGovernor,
    api_url: String,
    events: broadcast::Sender<SyncEvent>,
    interrupt: Arc<Notify>,
}

impl<A: GitHubApi + ?Sized> SyncOrchestrator<A> {
    pub fn new(api: Arc<A>, store: MirrorStore, config: &MirrorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            store,
            governor: RateGovernor::from_config(&config.rate_limit),
            api_url: config.github.api_url.trim_end_matches('/').to_string(),
            events,
            interrupt: Arc::new(Notify::new()),
        }
    }

    /// Share an externally owned interrupt signal. Only `notify_waiters`
    /// interrupts a repository; signals raised between repositories are dropped.
    pub fn with_interrupt(mut self, interrupt: Arc<Notify>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interrupt_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.interrupt)
    }

    /// Turn every Ctrl-C into a per-repository interrupt
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let interrupt = self.interrupt_handle();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, skipping the rest of this repository");
                interrupt.notify_waiters();
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    fn send_event(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No sync event subscribers");
        }
    }

    pub async fn run(&self, options: &SyncOptions) -> Result<SyncReport> {
        let steps = options.steps();
        let repositories: Vec<String> = self
            .list_repositories(&options.organization)
            .await?
            .iter()
            .filter(|r| options.wants(r))
            .filter_map(|r| r.get("full_name").and_then(Value::as_str).map(str::to_string))
            .collect();

        tracing::info!(
            organization = %options.organization,
            repositories = repositories.len(),
            steps = ?steps,
            "Starting sync"
        );
        self.send_event(SyncEvent::Started {
            organization: options.organization.clone(),
            repositories: repositories.len(),
        });

        let mut report = SyncReport::default();
        for repository in repositories {
            self.send_event(SyncEvent::RepoStarted {
                repository: repository.clone(),
            });

            let outcome = tokio::select! {
                biased;
                _ = self.interrupt.notified() => None,
                result = self.sync_repository(&repository, &steps) => Some(result?),
            };

            match outcome {
                Some(step_stats) => {
                    report.absorb(step_stats);
                    self.send_event(SyncEvent::RepoCompleted {
                        repository: repository.clone(),
                    });
                    report.synced.push(repository);
                }
                None => {
                    tracing::warn!(repository = %repository, "Repository sync interrupted");
                    self.send_event(SyncEvent::RepoInterrupted {
                        repository: repository.clone(),
                    });
                    report.interrupted.push(repository);
                }
            }
        }

        self.send_event(SyncEvent::Finished {
            synced: report.synced.len(),
            interrupted: report.interrupted.len(),
        });
        Ok(report)
    }

    async fn list_repositories(&self, organization: &str) -> Result<Vec<Value>> {
        let url = organization_repos_url(&self.api_url, organization);
        let mut pages = RemotePages::new(self.api.as_ref(), url);
        let mut repositories = Vec::new();

        while let Some(page) = pages.next_page().await? {
            repositories.extend(page.items);
            if let Some(limit) = page.rate_limit {
                self.governor.observe(&limit).await;
            }
        }

        if pages.was_absent() {
            return Err(MirrorError::NotFound(format!("organization {}", organization)));
        }
        Ok(repositories)
    }

    async fn sync_repository(
        &self,
        repository: &str,
        steps: &[Resource],
    ) -> Result<Vec<(Resource, StepStats)>> {
        let ctx = SyncContext::new(self.api.as_ref(), &self.store, &self.governor, &self.api_url);
        let mut completed = Vec::with_capacity(steps.len());

        for &resource in steps {
            let started = Instant::now();
            let stats = match resource {
                Resource::ReleaseDrafts => StepStats::Reap(ctx.reap_drafts(repository).await?),
                Resource::Releases => StepStats::Fetch(ctx.fetch_releases(repository).await?),
                Resource::Pulls => StepStats::Fetch(ctx.fetch_pulls(repository).await?),
                Resource::PullReviews => StepStats::Fetch(ctx.fetch_reviews(repository).await?),
                Resource::Issues => StepStats::Fetch(ctx.fetch_issues(repository).await?),
                Resource::IssueEvents => {
                    StepStats::Fetch(ctx.fetch_issue_events(repository).await?)
                }
            };
            metrics::record_step_duration(resource.as_str(), started.elapsed().as_secs_f64());

            self.send_event(SyncEvent::StepCompleted {
                repository: repository.to_string(),
                resource,
                stats,
            });
            completed.push((resource, stats));
        }

        Ok(completed)
    }
}
