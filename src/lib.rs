//! ghmirror - GitHub organization mirror
//!
//! Keeps a local document store in sync with the issues, pull requests,
//! reviews, releases and app installations of a GitHub organization. Two
//! update paths feed the same store:
//!
//! - **bulk sync** pages the REST API repository by repository, pacing
//!   itself against the rate window
//! - **webhooks** re-fetch the document each delivery refers to
//!
//! Every document is stored verbatim under a canonical key derived from its
//! URL fields, so both paths converge on the same rows.
//!
//! # Architecture
//!
//! - **document**: canonical identity of mirrored documents
//! - **store**: SQLite document store and offset pagination
//! - **github**: REST client, rate governor, retry
//! - **sync**: fetchers, draft reaper, orchestrator
//! - **webhook**: signature check, reconciler, HTTP server
//! - **config**: YAML configuration with environment overrides

pub mod config;
pub mod document;
pub mod error;
pub mod github;
pub mod logging;
pub mod metrics;
pub mod store;
pub mod style;
pub mod sync;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{MirrorError, Result};
