//! SQLite document store

use super::pager::Pages;
use super::query::DocumentQuery;
use crate::config::StoreConfig;
use crate::document::{self, Collection, Identity, KEY_FIELD};
use crate::{metrics, MirrorError, Result};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A document as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: Collection,
    pub key: String,
    /// The mirrored body, including the injected `_id`
    pub body: Value,
}

/// Result of [`MirrorStore::upsert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Written at this identity
    Stored(Identity),
    /// No canonical key could be derived; nothing was written
    Unresolved,
}

impl UpsertOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, UpsertOutcome::Stored(_))
    }
}

/// Schemaless key-per-collection store backed by SQLite.
///
/// Rows keep their insertion position across overwrites, so paging by
/// offset is not disturbed by re-storing rows that were already visited.
pub struct MirrorStore {
    conn: Connection,
}

impl MirrorStore {
    /// Open or create the store database
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening mirror store");

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        Self::from_connection(conn)
    }

    /// Fresh private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_regexp(&conn)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, key)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            "#,
        )?;
        Ok(())
    }

    /// Store a document under its derived identity, replacing any previous
    /// version. Unresolvable documents are logged, counted and skipped.
    pub fn upsert(&self, document: &Value) -> Result<UpsertOutcome> {
        match document::resolve(document) {
            Some(identity) => {
                self.put(&identity, document)?;
                Ok(UpsertOutcome::Stored(identity))
            }
            None => {
                let url = document.get("url").and_then(Value::as_str).unwrap_or("-");
                let html_url = document.get("html_url").and_then(Value::as_str).unwrap_or("-");
                tracing::warn!(url, html_url, "Dropping document with unresolvable identity");
                metrics::record_unresolved("store");
                Ok(UpsertOutcome::Unresolved)
            }
        }
    }

    /// Store a document at an explicit identity
    pub fn put(&self, identity: &Identity, document: &Value) -> Result<()> {
        let mut body = document.clone();
        let object = body.as_object_mut().ok_or_else(|| {
            MirrorError::Storage(format!("{} is not a JSON object", identity.key))
        })?;
        object.insert(KEY_FIELD.to_string(), Value::String(identity.key.clone()));

        self.conn.execute(
            r#"
            INSERT INTO documents (collection, key, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection, key) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![
                identity.collection.as_str(),
                identity.key,
                serde_json::to_string(&body)?,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;

        tracing::trace!(key = %identity.key, "Stored document");
        metrics::record_document_stored(identity.collection.as_str());
        Ok(())
    }

    /// Fetch one document by key
    pub fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).map_err(MirrorError::from))
            .transpose()
    }

    /// Delete one document; returns whether a row existed
    pub fn remove(&self, collection: Collection, key: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection.as_str(), key],
        )?;
        tracing::debug!(collection = %collection, key = %key, deleted, "Removed document");
        Ok(deleted > 0)
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// One page of a query, in insertion order
    pub fn find_page(
        &self,
        query: &DocumentQuery,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredDocument>> {
        query.check_patterns()?;
        let (clause, mut values) = query.where_clause();
        let sql = format!(
            "SELECT key, body FROM documents WHERE {} ORDER BY rowid LIMIT ? OFFSET ?",
            clause
        );
        values.push(SqlValue::Integer(limit as i64));
        values.push(SqlValue::Integer(offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (key, body) = row?;
            documents.push(StoredDocument {
                collection: query.collection,
                key,
                body: serde_json::from_str(&body)?,
            });
        }
        Ok(documents)
    }

    /// Lazy pages over a query, see [`Pages`]
    pub fn pages(&self, query: DocumentQuery, page_size: usize) -> Pages<'_> {
        Pages::new(self, query, page_size)
    }
}

/// `regexp(pattern, text)`; NULL or non-text never matches
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let matched = match ctx.get_raw(1) {
                ValueRef::Text(text) => std::str::from_utf8(text)
                    .map(|t| pattern.is_match(t))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(matched)
        },
    )?;
    Ok(())
}
