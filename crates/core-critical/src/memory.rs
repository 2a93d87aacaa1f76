//! In-memory document store
//!
//! Enforces the same conditional-write rules as a durable store, which makes
//! it the reference implementation for tests of critical interactions.

use crate::store::{DocumentStore, StoreError, StoreResult, VersionedDocument, WritePrecondition};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

type Key = (String, String);

/// Thread-safe in-memory [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<Key, VersionedDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of a kind
    pub fn count(&self, kind: &str) -> usize {
        self.documents
            .read()
            .map(|docs| docs.keys().filter(|(k, _)| k == kind).count())
            .unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

impl DocumentStore for MemoryStore {
    fn get(&self, kind: &str, id: &str) -> StoreResult<VersionedDocument> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        documents
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: kind.to_string(),
                id: id.to_string(),
            })
    }

    fn put(
        &self,
        kind: &str,
        id: &str,
        body: Value,
        precondition: WritePrecondition,
    ) -> StoreResult<u64> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        let key = (kind.to_string(), id.to_string());
        let current = documents.get(&key).map(|doc| doc.version);

        let next = match (precondition, current) {
            (WritePrecondition::DoesNotExist, None) => 1,
            (WritePrecondition::MatchesVersion(expected), Some(found)) if expected == found => {
                found + 1
            }
            (WritePrecondition::DoesNotExist, found) => {
                return Err(StoreError::Conflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    expected: None,
                    current: found,
                })
            }
            (WritePrecondition::MatchesVersion(expected), found) => {
                return Err(StoreError::Conflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    expected: Some(expected),
                    current: found,
                })
            }
        };

        documents.insert(
            key,
            VersionedDocument {
                version: next,
                body,
            },
        );
        Ok(next)
    }

    fn list(&self, kind: &str) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        let mut ids: Vec<String> = documents
            .keys()
            .filter(|(k, _)| k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
