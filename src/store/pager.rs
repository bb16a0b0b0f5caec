//! Offset pagination over stored documents
//!
//! Each page re-issues the query with a larger OFFSET instead of holding one
//! long-lived cursor. Pages are disjoint at the moment they are read; rows
//! inserted into or deleted from the scanned range while a traversal is in
//! progress can shift later pages, so a row may be skipped or seen twice.

use super::query::DocumentQuery;
use super::sqlite::{MirrorStore, StoredDocument};
use crate::Result;

/// Page size used by the fetchers when walking stored documents
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Lazy sequence of pages; ends at the first empty page or the first error
pub struct Pages<'a> {
    store: &'a MirrorStore,
    query: DocumentQuery,
    page_size: usize,
    page: usize,
    done: bool,
}

impl<'a> Pages<'a> {
    pub(crate) fn new(store: &'a MirrorStore, query: DocumentQuery, page_size: usize) -> Self {
        Self {
            store,
            query,
            page_size: page_size.max(1),
            page: 0,
            done: false,
        }
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Vec<StoredDocument>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let offset = self.page * self.page_size;
        match self.store.find_page(&self.query, self.page_size, offset) {
            Ok(rows) if rows.is_empty() => {
                self.done = true;
                None
            }
            Ok(rows) => {
                tracing::trace!(
                    collection = %self.query.collection,
                    page = self.page,
                    rows = rows.len(),
                    "Read store page"
                );
                self.page += 1;
                Some(Ok(rows))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
