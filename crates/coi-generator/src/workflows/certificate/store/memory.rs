use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentCursor, DocumentStore, FieldFilter, StoreError};

/// Collections of JSON documents held in memory.
///
/// `find` on an unknown collection yields an empty cursor while `count` fails,
/// matching how the hosted store treats missing collections for aggregate
/// counts. Open cursors are tracked so callers can verify they were released.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a fixture shaped as `{ "<Collection>": [ {..}, .. ] }`.
    pub fn from_json(fixture: Value) -> Result<Self, StoreError> {
        let Value::Object(entries) = fixture else {
            return Err(StoreError::Fixture(
                "top level must be an object of collections".to_string(),
            ));
        };

        let store = Self::new();
        for (collection, documents) in entries {
            let Value::Array(documents) = documents else {
                return Err(StoreError::Fixture(format!(
                    "collection '{collection}' must be an array"
                )));
            };
            store.insert_many(&collection, documents)?;
        }
        Ok(store)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| StoreError::Fixture(format!("{}: {err}", path.display())))?;
        let fixture: Value = serde_json::from_str(&raw)
            .map_err(|err| StoreError::Fixture(format!("{}: {err}", path.display())))?;
        Self::from_json(fixture)
    }

    pub fn insert(&self, collection: &str, document: Value) -> Result<(), StoreError> {
        self.insert_many(collection, vec![document])
    }

    pub fn insert_many(&self, collection: &str, documents: Vec<Value>) -> Result<(), StoreError> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| StoreError::Unavailable("collection lock poisoned".to_string()))?;
        guard
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(())
    }

    /// Number of cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::Acquire)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(
        &self,
        collection: &str,
        filter: &FieldFilter,
    ) -> Result<Box<dyn DocumentCursor>, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("collection lock poisoned".to_string()))?;
        let documents: VecDeque<Value> = guard
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.open_cursors.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryCursor {
            documents,
            open_cursors: Arc::clone(&self.open_cursors),
            closed: false,
        }))
    }

    async fn count(&self, collection: &str, filter: &FieldFilter) -> Result<u64, StoreError> {
        let guard = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("collection lock poisoned".to_string()))?;
        let documents = guard
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        Ok(documents
            .iter()
            .filter(|document| filter.matches(document))
            .count() as u64)
    }
}

struct MemoryCursor {
    documents: VecDeque<Value>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next(&mut self) -> Result<Option<Value>, StoreError> {
        if self.closed {
            return Err(StoreError::CursorClosed);
        }
        Ok(self.documents.pop_front())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        if !self.closed {
            self.closed = true;
            self.documents.clear();
            self.open_cursors.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(())
    }
}
