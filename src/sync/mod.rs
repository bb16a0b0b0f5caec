//! Bulk sync path
//!
//! Pulls an organization's issues, pull requests, reviews, releases and
//! issue events into the store, pacing itself against the rate window.

mod drafts;
pub mod fetch;
mod orchestrator;

pub use drafts::ReapStats;
pub use fetch::{collect_issue_events, FetchStats, SyncContext};
pub use orchestrator::{
    Resource, StepStats, SyncEvent, SyncOptions, SyncOrchestrator, SyncReport,
};
