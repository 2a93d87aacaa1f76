//! Error types for package transports

use crate::package::PackageError;
use std::io;
use thiserror::Error;

/// Result type alias for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Missing required transport hint '{key}'")]
    MissingHint { key: String },

    #[error("Invalid value '{value}' for transport hint '{key}'")]
    InvalidHint { key: String, value: String },

    #[error("This transport only supports AUTHMODE userpass (was: '{found}')")]
    UnsupportedAuthMode { found: String },

    #[error("Unsupported transport protocol '{0}'")]
    UnsupportedProtocol(String),

    #[error("Transport session has been closed")]
    SessionClosed,

    #[error("Package stream MUST have a name")]
    MissingPackageName,

    /// The target collection is missing, unknown to the service or refused as a target
    #[error("Invalid collection '{collection}': {reason}")]
    InvalidCollection { collection: String, reason: String },

    /// The target system computed a different checksum for the received bytes
    #[error("Checksum mismatch reported by '{endpoint}': {message}")]
    ChecksumMismatch { endpoint: String, message: String },

    /// The target system does not accept this packaging type
    #[error("Unsupported packaging type '{packaging}': {message}")]
    UnsupportedPackaging { packaging: String, message: String },

    /// Any other rejection, carrying the target system's diagnostic
    #[error("Deposit rejected with HTTP {status}{}: {message}", .error_uri.as_deref().map(|u| format!(" ({u})")).unwrap_or_default())]
    Rejected {
        status: u16,
        error_uri: Option<String>,
        message: String,
    },

    #[error("Authentication to '{endpoint}' failed with HTTP {status}")]
    Authentication { endpoint: String, status: u16 },

    #[error("Unable to reach '{endpoint}': {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unexpected response from '{endpoint}': {message}")]
    Protocol { endpoint: String, message: String },

    #[error("Unable to produce the package: {0}")]
    Package(#[from] PackageError),

    #[error("FTP error: {0}")]
    Ftp(String),

    #[error("Transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// The package (or its description) was at fault rather than the service
    pub fn is_package_fault(&self) -> bool {
        matches!(
            self,
            TransportError::ChecksumMismatch { .. }
                | TransportError::UnsupportedPackaging { .. }
                | TransportError::MissingPackageName
                | TransportError::Package(_)
        )
    }

    /// The target system could not be reached
    pub fn is_network(&self) -> bool {
        match self {
            TransportError::Connection { .. } => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Missing or malformed transport configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransportError::MissingHint { .. }
                | TransportError::InvalidHint { .. }
                | TransportError::UnsupportedAuthMode { .. }
                | TransportError::UnsupportedProtocol(_)
        )
    }
}
