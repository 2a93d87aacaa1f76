/*!
 * Error types for the deposit services
 */

use crate::config::ConfigError;
use crate::package::PackageError;
use crate::service::{ProcessingError, RegistryError};
use crate::status::StatusError;
use crate::transport::TransportError;
use pass_deposit_core_critical::StoreError;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DepositError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_INTEGRITY: i32 = 3;

#[derive(Error, Debug)]
pub enum DepositError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DepositError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Integrity => EXIT_INTEGRITY,
            ErrorCategory::Configuration => EXIT_FATAL,
            _ if self.is_fatal() => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if this error is fatal (redelivering the event will not help)
    pub fn is_fatal(&self) -> bool {
        match self.category() {
            ErrorCategory::Configuration
            | ErrorCategory::Integrity
            | ErrorCategory::Packaging
            | ErrorCategory::Security => true,
            ErrorCategory::Network
            | ErrorCategory::Storage
            | ErrorCategory::Concurrency
            | ErrorCategory::Rejected
            | ErrorCategory::Io => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DepositError::Config(_) | DepositError::Logging(_) => ErrorCategory::Configuration,
            DepositError::Registry(RegistryError::Package(e)) => package_category(e),
            DepositError::Registry(RegistryError::Transport(e)) => transport_category(e),
            DepositError::Registry(RegistryError::Packager { .. }) => ErrorCategory::Configuration,
            DepositError::Store(e) => store_category(e),
            DepositError::Package(e) => package_category(e),
            DepositError::Transport(e) => transport_category(e),
            DepositError::Status(e) => status_category(e),
            DepositError::Processing(e) => processing_category(e),
            DepositError::Io(_) => ErrorCategory::Io,
        }
    }
}

fn store_category(error: &StoreError) -> ErrorCategory {
    match error {
        StoreError::Conflict { .. } => ErrorCategory::Concurrency,
        _ => ErrorCategory::Storage,
    }
}

fn package_category(error: &PackageError) -> ErrorCategory {
    if error.is_configuration() {
        ErrorCategory::Configuration
    } else {
        ErrorCategory::Packaging
    }
}

fn transport_category(error: &TransportError) -> ErrorCategory {
    match error {
        TransportError::ChecksumMismatch { .. } => ErrorCategory::Integrity,
        TransportError::Package(e) => package_category(e),
        TransportError::Authentication { .. } => ErrorCategory::Security,
        TransportError::Rejected { .. } | TransportError::Protocol { .. } => {
            ErrorCategory::Rejected
        }
        e if e.is_package_fault() => ErrorCategory::Packaging,
        e if e.is_configuration() => ErrorCategory::Configuration,
        TransportError::InvalidCollection { .. } => ErrorCategory::Configuration,
        e if e.is_network() => ErrorCategory::Network,
        TransportError::Connection { .. } | TransportError::Ftp(_) => ErrorCategory::Network,
        _ => ErrorCategory::Io,
    }
}

fn status_category(error: &StatusError) -> ErrorCategory {
    match error {
        e if e.is_configuration() => ErrorCategory::Configuration,
        StatusError::Parse { .. } | StatusError::HttpStatus { .. } => ErrorCategory::Rejected,
        _ => ErrorCategory::Network,
    }
}

fn processing_category(error: &ProcessingError) -> ErrorCategory {
    match error {
        ProcessingError::Postcondition { .. } | ProcessingError::Critical { .. } => {
            ErrorCategory::Concurrency
        }
        ProcessingError::MissingPackager { .. } => ErrorCategory::Configuration,
        ProcessingError::Build { .. } => ErrorCategory::Packaging,
        ProcessingError::Store(e) => store_category(e),
        ProcessingError::Package(e) => package_category(e),
        ProcessingError::Transport(e) => transport_category(e),
        ProcessingError::Status(e) => status_category(e),
        ProcessingError::Executor(_) => ErrorCategory::Concurrency,
    }
}

/// Error category for structured reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid configuration, hints or mappings
    Configuration,
    /// The target system computed a different checksum
    Integrity,
    /// The package could not be produced or was refused as malformed
    Packaging,
    /// The target system refused the deposit for another reason
    Rejected,
    /// Credentials were refused
    Security,
    /// The target system could not be reached
    Network,
    /// The record store failed
    Storage,
    /// A concurrent update won, or a critical update did not hold
    Concurrency,
    /// Local I/O
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Packaging => write!(f, "packaging"),
            ErrorCategory::Rejected => write!(f, "rejected"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}
