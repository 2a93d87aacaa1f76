//! Critical repository interactions
//!
//! A [`CriticalRepositoryInteraction`] runs one fetch, check, mutate, persist
//! and verify sequence against a single resource and reports the outcome as a
//! tagged [`CriticalResult`]. It never retries. A lost race surfaces as the
//! store's conflict error inside [`CriticalResult::MutationFailed`].

use crate::store::{DocumentStore, ResourceStore, StoredResource};
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a pre- or postcondition: `Err` carries the violated expectation
pub type Verdict = Result<(), String>;

/// Failure raised by a critical function or by the store around it
pub type CriticalError = Box<dyn Error + Send + Sync + 'static>;

/// A critical function panicked instead of returning
#[derive(Debug, thiserror::Error)]
#[error("critical function panicked: {message}")]
pub struct MutationPanicked {
    pub message: String,
}

impl MutationPanicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|m| m.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { message }
    }
}

/// Outcome of one critical interaction over a resource `T` computing `R`
pub enum CriticalResult<R, T> {
    /// Precondition, mutation and postcondition all held
    Success { resource: T, value: R },

    /// The resource was not in the expected state; nothing was written
    PreconditionFailed { resource: T, reason: String },

    /// The mutation ran but the resulting state is not what was expected
    PostconditionFailed {
        resource: T,
        value: R,
        reason: String,
    },

    /// Fetching, mutating or persisting the resource failed
    MutationFailed {
        resource: Option<T>,
        cause: CriticalError,
    },
}

impl<R, T> CriticalResult<R, T> {
    pub fn success(&self) -> bool {
        matches!(self, CriticalResult::Success { .. })
    }

    /// The resource as last observed by the interaction
    pub fn resource(&self) -> Option<&T> {
        match self {
            CriticalResult::Success { resource, .. }
            | CriticalResult::PreconditionFailed { resource, .. }
            | CriticalResult::PostconditionFailed { resource, .. } => Some(resource),
            CriticalResult::MutationFailed { resource, .. } => resource.as_ref(),
        }
    }

    /// The value computed by the critical function, if it ran to completion
    pub fn result(&self) -> Option<&R> {
        match self {
            CriticalResult::Success { value, .. }
            | CriticalResult::PostconditionFailed { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The captured failure, present only when something raised an error
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            CriticalResult::MutationFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// The violated pre- or postcondition
    pub fn reason(&self) -> Option<&str> {
        match self {
            CriticalResult::PreconditionFailed { reason, .. }
            | CriticalResult::PostconditionFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Consume a successful result into its resource and computed value
    pub fn into_success(self) -> Option<(T, R)> {
        match self {
            CriticalResult::Success { resource, value } => Some((resource, value)),
            _ => None,
        }
    }
}

impl<R, T> fmt::Debug for CriticalResult<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriticalResult::Success { .. } => write!(f, "Success"),
            CriticalResult::PreconditionFailed { reason, .. } => {
                write!(f, "PreconditionFailed({reason})")
            }
            CriticalResult::PostconditionFailed { reason, .. } => {
                write!(f, "PostconditionFailed({reason})")
            }
            CriticalResult::MutationFailed { cause, .. } => write!(f, "MutationFailed({cause})"),
        }
    }
}

/// Performs critical interactions against a shared store
pub struct CriticalRepositoryInteraction<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for CriticalRepositoryInteraction<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore + ?Sized> CriticalRepositoryInteraction<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `critical` against resource `id` of type `T`
    ///
    /// The postcondition is checked twice: against the mutated value before
    /// it is written (so a violated expectation leaves the stored state
    /// untouched) and against the state the store reports after the write.
    /// The write itself is conditional on the version that was fetched.
    pub fn perform_critical<T, R, P, Q, F>(
        &self,
        id: &str,
        precondition: P,
        postcondition: Q,
        critical: F,
    ) -> CriticalResult<R, T>
    where
        T: StoredResource,
        P: FnOnce(&T) -> Verdict,
        Q: Fn(&T, &R) -> Verdict,
        F: FnOnce(&mut T) -> Result<R, CriticalError>,
    {
        let fetched: T = match self.store.fetch(id) {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Unable to read {} '{}': {}", T::KIND, id, e);
                return CriticalResult::MutationFailed {
                    resource: None,
                    cause: Box::new(e),
                };
            }
        };

        if let Err(reason) = precondition(&fetched) {
            debug!("Precondition failed for {} '{}': {}", T::KIND, id, reason);
            return CriticalResult::PreconditionFailed {
                resource: fetched,
                reason,
            };
        }

        let mut updated = fetched.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| critical(&mut updated)))
            .unwrap_or_else(|payload| {
                Err(Box::new(MutationPanicked::from_payload(payload.as_ref())) as CriticalError)
            });
        let value = match outcome {
            Ok(value) => value,
            Err(cause) => {
                debug!("Critical update of {} '{}' failed: {}", T::KIND, id, cause);
                return CriticalResult::MutationFailed {
                    resource: Some(fetched),
                    cause,
                };
            }
        };

        if let Err(reason) = postcondition(&updated, &value) {
            debug!(
                "Postcondition failed for {} '{}' before persisting: {}",
                T::KIND,
                id,
                reason
            );
            return CriticalResult::PostconditionFailed {
                resource: fetched,
                value,
                reason,
            };
        }

        let persisted: T = match self.store.persist(&updated) {
            Ok(resource) => resource,
            Err(e) => {
                debug!("Unable to persist {} '{}': {}", T::KIND, id, e);
                return CriticalResult::MutationFailed {
                    resource: Some(updated),
                    cause: Box::new(e),
                };
            }
        };

        if let Err(reason) = postcondition(&persisted, &value) {
            debug!(
                "Postcondition failed for {} '{}' after persisting: {}",
                T::KIND,
                id,
                reason
            );
            return CriticalResult::PostconditionFailed {
                resource: persisted,
                value,
                reason,
            };
        }

        CriticalResult::Success {
            resource: persisted,
            value,
        }
    }
}
