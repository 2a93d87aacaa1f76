//! Resource store contract
//!
//! Stores hold JSON documents addressed by `(kind, id)`, each carrying a
//! monotonically increasing version. Writes are conditional: a writer must
//! state which version it expects to replace, and the store refuses the write
//! when its current version differs.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by resource stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("conditional write of {kind} '{id}' refused: expected version {expected:?}, store holds {current:?}")]
    Conflict {
        kind: String,
        id: String,
        expected: Option<u64>,
        current: Option<u64>,
    },

    #[error("failed to (de)serialize {kind} '{id}': {source}")]
    Serialization {
        kind: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True when the error reports a lost optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Condition a store must verify before accepting a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// The document must not exist yet
    DoesNotExist,
    /// The document must currently be at exactly this version
    MatchesVersion(u64),
}

/// A stored document together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub version: u64,
    pub body: Value,
}

/// Raw document storage with conditional writes
///
/// Implementations must provide read-after-write consistency for a single
/// document: a `get` issued after a successful `put` returns that write or a
/// later one.
pub trait DocumentStore: Send + Sync {
    /// Read the current state of a document
    fn get(&self, kind: &str, id: &str) -> StoreResult<VersionedDocument>;

    /// Write a document if `precondition` holds, returning the new version
    fn put(
        &self,
        kind: &str,
        id: &str,
        body: Value,
        precondition: WritePrecondition,
    ) -> StoreResult<u64>;

    /// List the ids of every stored document of a kind
    fn list(&self, kind: &str) -> StoreResult<Vec<String>>;
}

/// A typed resource kept in a [`DocumentStore`]
///
/// The version is owned by the store; implementors keep it out of their
/// serialized form (`#[serde(skip)]`) and let the store stamp it on read.
pub trait StoredResource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Document kind, used as the store namespace
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Version this value was read at, `None` for a resource not yet stored
    fn version(&self) -> Option<u64>;

    fn set_version(&mut self, version: u64);
}

/// Typed access on top of any [`DocumentStore`]
pub trait ResourceStore {
    /// Fetch the current state of a resource
    fn fetch<T: StoredResource>(&self, id: &str) -> StoreResult<T>;

    /// Conditionally write a resource and return the state the store now holds
    ///
    /// A resource without a version is created (and must not exist); a
    /// versioned resource replaces exactly that version.
    fn persist<T: StoredResource>(&self, resource: &T) -> StoreResult<T>;
}

impl<S: DocumentStore + ?Sized> ResourceStore for S {
    fn fetch<T: StoredResource>(&self, id: &str) -> StoreResult<T> {
        let document = self.get(T::KIND, id)?;
        let mut resource: T =
            serde_json::from_value(document.body).map_err(|source| StoreError::Serialization {
                kind: T::KIND.to_string(),
                id: id.to_string(),
                source,
            })?;
        resource.set_version(document.version);
        Ok(resource)
    }

    fn persist<T: StoredResource>(&self, resource: &T) -> StoreResult<T> {
        let id = resource.id();
        let body = serde_json::to_value(resource).map_err(|source| StoreError::Serialization {
            kind: T::KIND.to_string(),
            id: id.to_string(),
            source,
        })?;
        let precondition = match resource.version() {
            None => WritePrecondition::DoesNotExist,
            Some(version) => WritePrecondition::MatchesVersion(version),
        };
        self.put(T::KIND, id, body, precondition)?;
        self.fetch(id)
    }
}
