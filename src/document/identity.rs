//! Canonical identity of mirrored documents
//!
//! Every document, whether it came from a bulk listing or a webhook payload,
//! is keyed as `{doc_type}/{org}/{repo}/{business_key}`. The key is derived
//! purely from the document's own fields so that the bulk and push paths
//! converge on the same row.
//!
//! Routing rules:
//! - a marker in `html_url` wins (reviews and installations have no `url`)
//! - otherwise the second-to-last path segment of `url` names the collection
//! - org and repo are the 4th and 3rd from last segments of `url`, or of
//!   `html_url` when `url` is absent

use super::kind::{Collection, DocType};
use serde::Serialize;
use serde_json::Value;

/// `html_url` fragment that identifies a pull request review
pub const REVIEW_MARKER: &str = "#pullrequestreview-";

/// `html_url` path that identifies an app installation
pub const INSTALLATION_MARKER: &str = "/settings/installations/";

/// Field injected into every stored document, holding its canonical key
pub const KEY_FIELD: &str = "_id";

/// Where a document lives in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub doc_type: DocType,
    pub collection: Collection,
    pub key: String,
}

impl Identity {
    fn new(doc_type: DocType, org: &str, repo: &str, business_key: &str) -> Self {
        Self {
            doc_type,
            collection: doc_type.collection(),
            key: format!("{}/{}/{}/{}", doc_type.as_str(), org, repo, business_key),
        }
    }
}

/// Derive the collection and canonical key of a document.
///
/// Returns `None` when the document type cannot be mapped, when neither
/// `url` nor `html_url` is present, or when the business key is missing.
/// Callers must treat `None` as "do not persist".
pub fn resolve(document: &Value) -> Option<Identity> {
    let doc_type = DocType::from_collection(detect_collection(document)?);
    identity_for(document, doc_type, doc_type)
}

/// Like [`resolve`], but routes the document as `doc_type`.
///
/// The business key is still read from the field the document's own type
/// uses, so a review routed as a pull request is keyed by its review id.
pub fn resolve_as(document: &Value, doc_type: DocType) -> Option<Identity> {
    let natural = DocType::from_collection(detect_collection(document)?);
    identity_for(document, natural, doc_type)
}

/// Collection a document belongs to, from its URL fields alone
pub fn detect_collection(document: &Value) -> Option<Collection> {
    if let Some(html_url) = str_field(document, "html_url") {
        if html_url.contains(REVIEW_MARKER) {
            return Some(Collection::Reviews);
        }
        if html_url.contains(INSTALLATION_MARKER) {
            return Some(Collection::Installations);
        }
    }

    let url = str_field(document, "url")?;
    Collection::parse(url.rsplit('/').nth(1)?)
}

/// Collection for a canonical key, via its `doc_type` segment.
///
/// Always agrees with [`resolve`] for the document that produced the key.
pub fn collection_for_key(key: &str) -> Option<Collection> {
    let (doc_type, rest) = key.split_once('/')?;
    if rest.split('/').count() < 3 {
        return None;
    }
    DocType::parse(doc_type).map(|t| t.collection())
}

/// (org, repo) from the 4th and 3rd from last URL segments
pub fn owner_and_repo(document: &Value) -> Option<(&str, &str)> {
    let url = str_field(document, "url").or_else(|| str_field(document, "html_url"))?;
    let segments: Vec<&str> = url.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    let org = segments[segments.len() - 4];
    let repo = segments[segments.len() - 3];
    if org.is_empty() || repo.is_empty() {
        return None;
    }
    Some((org, repo))
}

fn identity_for(document: &Value, key_source: DocType, doc_type: DocType) -> Option<Identity> {
    let (org, repo) = owner_and_repo(document)?;
    let business_key = business_key(document, key_source.business_key_field())?;
    Some(Identity::new(doc_type, org, repo, &business_key))
}

fn business_key(document: &Value, field: &str) -> Option<String> {
    match document.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field<'a>(document: &'a Value, field: &str) -> Option<&'a str> {
    document.get(field).and_then(Value::as_str)
}
