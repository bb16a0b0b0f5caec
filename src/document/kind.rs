//! Document types and the collections they are routed to

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `doc_type` segment of a canonical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Issue,
    PullRequest,
    Review,
    Release,
    Installation,
}

impl DocType {
    pub const ALL: [DocType; 5] = [
        DocType::Issue,
        DocType::PullRequest,
        DocType::Review,
        DocType::Release,
        DocType::Installation,
    ];

    /// Key prefix. Issues use the plural form.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Issue => "issues",
            DocType::PullRequest => "pull_request",
            DocType::Review => "review",
            DocType::Release => "release",
            DocType::Installation => "installation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DocType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Fixed doc_type → collection table
    pub fn collection(&self) -> Collection {
        match self {
            DocType::Issue => Collection::Issues,
            DocType::PullRequest => Collection::Pulls,
            DocType::Review => Collection::Reviews,
            DocType::Release => Collection::Releases,
            DocType::Installation => Collection::Installations,
        }
    }

    pub fn from_collection(collection: Collection) -> Self {
        match collection {
            Collection::Issues => DocType::Issue,
            Collection::Pulls => DocType::PullRequest,
            Collection::Reviews => DocType::Review,
            Collection::Releases => DocType::Release,
            Collection::Installations => DocType::Installation,
        }
    }

    /// Field holding the business key within a document of this type
    pub fn business_key_field(&self) -> &'static str {
        match self {
            DocType::Issue | DocType::PullRequest => "number",
            DocType::Review | DocType::Installation => "id",
            DocType::Release => "tag_name",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named collection in the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Issues,
    Pulls,
    Reviews,
    Releases,
    Installations,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Issues,
        Collection::Pulls,
        Collection::Reviews,
        Collection::Releases,
        Collection::Installations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Issues => "issues",
            Collection::Pulls => "pulls",
            Collection::Reviews => "reviews",
            Collection::Releases => "releases",
            Collection::Installations => "installations",
        }
    }

    /// Matches a collection name, which is also the API path segment
    /// preceding a resource id (`.../pulls/7`).
    pub fn parse(s: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_round_trips_through_collection() {
        for doc_type in DocType::ALL {
            assert_eq!(DocType::from_collection(doc_type.collection()), doc_type);
        }
    }

    #[test]
    fn test_doc_type_names() {
        assert_eq!(DocType::parse("pull_request"), Some(DocType::PullRequest));
        assert_eq!(DocType::parse("issues"), Some(DocType::Issue));
        assert_eq!(DocType::parse("pulls"), None);
        assert_eq!(DocType::Release.to_string(), "release");
    }

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::parse("pulls"), Some(Collection::Pulls));
        assert_eq!(Collection::parse("comments"), None);
    }
}
