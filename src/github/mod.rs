//! GitHub REST access
//!
//! - **client**: the [`GitHubApi`] seam and its reqwest implementation
//! - **remote**: not-found handling and `Link` pagination
//! - **rate**: the bulk-path rate governor
//! - **retry**: backoff for transient failures

mod client;
mod rate;
pub mod remote;
pub mod retry;

pub use client::{parse_next_link, ApiResponse, GitHubApi, GitHubClient};
pub use rate::{RateGovernor, RateLimit};
pub use remote::{fetch_document, Document, Fetched, Page, RemotePages};
pub use retry::{RetryConfig, RetryDecision, RetryableError};
