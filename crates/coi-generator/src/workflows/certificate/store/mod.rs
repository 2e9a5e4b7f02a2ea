//! Document-store seam used by the policy-head join and certificate numbering.
//!
//! Documents are plain JSON objects. The store only answers equality lookups on
//! a dotted field path; the join logic lives with the caller.

mod memory;

pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use serde_json::Value;

pub const ACTIVE_POLICY: &str = "ActivePolicy";
pub const POLICY: &str = "Policy";
pub const APPLICATION_ANSWERS: &str = "ApplicationAnswers";
pub const POLICY_QUOTE: &str = "PolicyQuote";
pub const QUOTE: &str = "Quote";
pub const APPLICATION_OWNER: &str = "ApplicationOwner";
pub const APPLICATION: &str = "Application";
pub const COI_RECORD: &str = "COIRecord";

/// Equality match on a dotted field path, e.g. `data.policyFoxdenId == "P-1"`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub path: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        lookup_path(document, &self.path) == Some(&self.value)
    }
}

/// Streaming result set. Callers must `close` it on every exit path.
#[async_trait]
pub trait DocumentCursor: Send + Sync {
    async fn next(&mut self) -> Result<Option<Value>, StoreError>;
    async fn close(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Box<dyn DocumentCursor>, StoreError>;

    async fn count(&self, collection: &str, filter: &FieldFilter) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("collection '{0}' does not exist")]
    MissingCollection(String),
    #[error("cursor already closed")]
    CursorClosed,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document store fixture: {0}")]
    Fixture(String),
}

/// Drains a cursor into memory and releases it, even when reading fails.
pub async fn collect_all(
    store: &(impl DocumentStore + ?Sized),
    collection: &str,
    filter: &FieldFilter,
) -> Result<Vec<Value>, StoreError> {
    let mut cursor = store.find(collection, filter).await?;
    let mut documents = Vec::new();
    let drained = loop {
        match cursor.next().await {
            Ok(Some(document)) => documents.push(document),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    let closed = cursor.close().await;
    drained?;
    closed?;
    Ok(documents)
}

/// Resolves a dotted path (`data.coverage.effectiveDate`) inside a document.
pub fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_path_walks_objects_and_arrays() {
        let document = json!({
            "data": {
                "policies": [{ "kind": "GL", "policyId": "P-1" }],
                "coverage": { "effectiveDate": "2025-01-01" }
            }
        });

        assert_eq!(
            lookup_path(&document, "data.coverage.effectiveDate"),
            Some(&json!("2025-01-01"))
        );
        assert_eq!(
            lookup_path(&document, "data.policies.0.policyId"),
            Some(&json!("P-1"))
        );
        assert!(lookup_path(&document, "data.coverage.expiryDate").is_none());
        assert!(lookup_path(&document, "data.policies.kind").is_none());
    }

    #[test]
    fn filter_matches_on_exact_value() {
        let document = json!({ "data": { "policyFoxdenId": "FOX-1" } });
        assert!(FieldFilter::eq("data.policyFoxdenId", "FOX-1").matches(&document));
        assert!(!FieldFilter::eq("data.policyFoxdenId", "FOX-2").matches(&document));
        assert!(!FieldFilter::eq("data.missing", "FOX-1").matches(&document));
    }
}
