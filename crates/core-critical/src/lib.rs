//! Core Critical: optimistic check-then-act against non-transactional stores
//!
//! # Overview
//!
//! Submissions and deposits live in a shared record store that offers no
//! transactions. Several consumers may react to the same event at the same
//! time, so every mutation runs as a *critical interaction*:
//!
//! 1. fetch the current state of the resource
//! 2. evaluate a precondition over that state
//! 3. run a critical function that mutates the resource and computes a value
//! 4. persist the resource with a conditional write on the version read in (1)
//! 5. evaluate a postcondition over the persisted state and the computed value
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Packaging formats or wire protocols
//! - How resources are rendered on disk or over the network
//!
//! The only synchronization primitive is the store's conditional write
//! ([`WritePrecondition`]). No in-process lock is taken, so the guarantees
//! hold across process boundaries.
//!
//! # Example
//!
//! ```
//! use pass_deposit_core_critical::{
//!     CriticalRepositoryInteraction, MemoryStore, ResourceStore, StoredResource,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Counter {
//!     id: String,
//!     value: u32,
//!     #[serde(skip)]
//!     version: Option<u64>,
//! }
//!
//! impl StoredResource for Counter {
//!     const KIND: &'static str = "counter";
//!     fn id(&self) -> &str { &self.id }
//!     fn version(&self) -> Option<u64> { self.version }
//!     fn set_version(&mut self, version: u64) { self.version = Some(version); }
//! }
//!
//! let store = Arc::new(MemoryStore::new());
//! store.persist(&Counter { id: "c1".into(), value: 0, version: None }).unwrap();
//!
//! let critical = CriticalRepositoryInteraction::new(store);
//! let result = critical.perform_critical::<Counter, u32, _, _, _>(
//!     "c1",
//!     |c| if c.value == 0 { Ok(()) } else { Err("already counted".into()) },
//!     |c, v| if c.value == *v { Ok(()) } else { Err("value not persisted".into()) },
//!     |c| { c.value += 1; Ok(c.value) },
//! );
//!
//! assert!(result.success());
//! ```

pub mod interaction;
pub mod memory;
pub mod store;

pub use interaction::{
    CriticalError, CriticalRepositoryInteraction, CriticalResult, MutationPanicked, Verdict,
};
pub use memory::MemoryStore;
pub use store::{
    DocumentStore, ResourceStore, StoreError, StoreResult, StoredResource, VersionedDocument,
    WritePrecondition,
};
