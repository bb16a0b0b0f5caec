//! Error types for ghmirror
//!
//! One error enum covers every failure that can escape the sync engine or the
//! webhook path. A document missing upstream is not an error; it surfaces as
//! [`crate::github::Fetched::Absent`].

use crate::github::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ghmirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Error type for ghmirror operations
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document store errors that are not raw SQLite failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// GitHub answered with a status we do not know how to handle
    #[error("GitHub API error: HTTP {status} for {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    /// An organization or repository the sync was pointed at does not exist
    #[error("Not found on GitHub: {0}")]
    NotFound(String),

    /// Rate limited by GitHub (seconds until the window resets)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Unexpected payload shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid filter pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl RetryableError for MirrorError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            MirrorError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    status_decision(status.as_u16())
                } else if e.is_decode() || e.is_builder() {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry
                }
            }
            MirrorError::Api { status, .. } => status_decision(*status),
            MirrorError::RateLimited(secs) => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs))
            }
            MirrorError::Config(_)
            | MirrorError::Storage(_)
            | MirrorError::NotFound(_)
            | MirrorError::Parse(_)
            | MirrorError::Io(_)
            | MirrorError::Json(_)
            | MirrorError::Yaml(_)
            | MirrorError::Database(_)
            | MirrorError::Pattern(_)
            | MirrorError::Other(_)
            | MirrorError::Anyhow(_) => RetryDecision::NoRetry,
        }
    }
}

/// Server-side and throttling statuses are transient; everything else is not.
fn status_decision(status: u16) -> RetryDecision {
    match status {
        429 => RetryDecision::RetryAfter(Duration::from_secs(60)),
        500..=599 => RetryDecision::Retry,
        _ => RetryDecision::NoRetry,
    }
}
