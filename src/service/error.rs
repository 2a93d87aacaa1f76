//! Error types for submission processing

use crate::package::PackageError;
use crate::status::StatusError;
use crate::transport::TransportError;
use pass_deposit_core_critical::{CriticalError, StoreError};
use thiserror::Error;

pub type ProcessingResult<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A critical update applied but left the resource in an unexpected state
    #[error("Failed to update {kind} '{id}': {reason}")]
    Postcondition {
        kind: &'static str,
        id: String,
        reason: String,
    },

    /// A critical update could not be read, applied or written
    #[error("Failed to update {kind} '{id}': {source}")]
    Critical {
        kind: &'static str,
        id: String,
        #[source]
        source: CriticalError,
    },

    #[error("No packager configured for repository '{repository}'")]
    MissingPackager { repository: String },

    #[error("Unable to build the deposit submission for '{submission}': {message}")]
    Build { submission: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Unable to schedule deposit task: {0}")]
    Executor(String),
}

impl ProcessingError {
    /// Recover a processing error that travelled through a critical function
    pub(crate) fn from_cause(kind: &'static str, id: &str, cause: CriticalError) -> Self {
        match cause.downcast::<ProcessingError>() {
            Ok(error) => *error,
            Err(cause) => match cause.downcast::<StoreError>() {
                Ok(error) => ProcessingError::Store(*error),
                Err(source) => ProcessingError::Critical {
                    kind,
                    id: id.to_string(),
                    source,
                },
            },
        }
    }

    /// Missing or invalid configuration named by the error
    pub fn is_configuration(&self) -> bool {
        match self {
            ProcessingError::MissingPackager { .. } => true,
            ProcessingError::Transport(e) => e.is_configuration(),
            ProcessingError::Status(e) => e.is_configuration(),
            ProcessingError::Package(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Render an error with its full chain of causes
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !rendered.contains(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        source = cause.source();
    }
    rendered
}
