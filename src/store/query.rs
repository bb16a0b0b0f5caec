//! Field filters over stored documents

use crate::document::Collection;
use rusqlite::types::Value as SqlValue;

/// A predicate on one JSON field of a stored document.
///
/// Paths use dots for nesting (`base.repo.full_name`). A document missing
/// the field never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    /// Field equals the given string
    Equals { path: String, value: String },
    /// Field is a string matching the regular expression
    Matches { path: String, pattern: String },
}

/// Filtered view of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub collection: Collection,
    pub filters: Vec<FieldFilter>,
}

impl DocumentQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
        }
    }

    pub fn field_eq(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter::Equals {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn field_matches(mut self, path: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(FieldFilter::Matches {
            path: path.into(),
            pattern: pattern.into(),
        });
        self
    }

    /// Compile every pattern so bad input surfaces as a pattern error
    /// instead of a failure inside SQLite
    pub fn check_patterns(&self) -> crate::Result<()> {
        for filter in &self.filters {
            if let FieldFilter::Matches { pattern, .. } = filter {
                regex::Regex::new(pattern)?;
            }
        }
        Ok(())
    }

    /// WHERE clause and its positional parameters
    pub(crate) fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut clause = String::from("collection = ?");
        let mut params = vec![SqlValue::Text(self.collection.as_str().to_string())];

        for filter in &self.filters {
            match filter {
                FieldFilter::Equals { path, value } => {
                    clause.push_str(" AND json_extract(body, ?) = ?");
                    params.push(SqlValue::Text(json_path(path)));
                    params.push(SqlValue::Text(value.clone()));
                }
                FieldFilter::Matches { path, pattern } => {
                    clause.push_str(" AND regexp(?, json_extract(body, ?))");
                    params.push(SqlValue::Text(pattern.clone()));
                    params.push(SqlValue::Text(json_path(path)));
                }
            }
        }

        (clause, params)
    }
}

fn json_path(path: &str) -> String {
    format!("$.{}", path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_binds_every_value() {
        let query = DocumentQuery::new(Collection::Pulls)
            .field_eq("base.repo.full_name", "acme/widgets")
            .field_matches("url", "/pulls/\\d+$");

        let (clause, params) = query.where_clause();
        assert_eq!(
            clause,
            "collection = ? AND json_extract(body, ?) = ? AND regexp(?, json_extract(body, ?))"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(params[1], SqlValue::Text("$.base.repo.full_name".to_string()));
        assert_eq!(params[3], SqlValue::Text("/pulls/\\d+$".to_string()));
    }

    #[test]
    fn test_check_patterns_rejects_invalid_regex() {
        let query = DocumentQuery::new(Collection::Releases).field_matches("tag_name", "(");
        assert!(query.check_patterns().is_err());
        assert!(DocumentQuery::new(Collection::Releases)
            .field_matches("tag_name", "^untagged-")
            .check_patterns()
            .is_ok());
    }
}
