//! Document store
//!
//! Idempotent upsert/delete of mirrored documents keyed by their canonical
//! identity, plus filtered offset pagination used to drive secondary fetches.

mod pager;
mod query;
mod sqlite;

pub use pager::{Pages, DEFAULT_PAGE_SIZE};
pub use query::{DocumentQuery, FieldFilter};
pub use sqlite::{MirrorStore, StoredDocument, UpsertOutcome};
