//! Error types for package assembly

use std::io;
use thiserror::Error;

/// Result type alias for package operations
pub type PackageResult<T> = std::result::Result<T, PackageError>;

#[derive(Error, Debug)]
pub enum PackageError {
    /// The location is not a path, bundled resource or HTTP(S) URL
    #[error("Unable to resolve the location of a submitted file ('{location}'): expected a file:, classpath:, http(s): location or a path")]
    UnresolvableLocation { location: String },

    /// A bundled (`classpath:`) location was used but no bundled root is configured
    #[error("Bundled resource '{location}' requested but no bundled resource root is configured")]
    NoBundledRoot { location: String },

    /// The custodial resource could not be opened
    #[error("Unable to open '{location}': {source}")]
    Unreadable {
        location: String,
        #[source]
        source: io::Error,
    },

    /// An HTTP(S) resource could not be retrieved
    #[error("Unable to retrieve '{location}': {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    /// Writing an entry into the archive failed
    #[error("Error putting resource '{name}' into archive output stream: {source}")]
    PutResource {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A resource produced a different number of bytes than declared
    #[error("Resource '{name}' changed size while being archived: declared {declared} bytes, read {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    /// A generated entry could not be serialized
    #[error("Unable to serialize '{entry}': {message}")]
    Serialization { entry: String, message: String },

    /// The package format name is not known
    #[error("Unknown package format '{0}'")]
    UnknownFormat(String),

    #[error("Package I/O error: {0}")]
    Io(#[from] io::Error),

    /// The producer thread could not be started or died
    #[error("Package producer failed: {0}")]
    Producer(String),
}

impl PackageError {
    /// True when the error was detected before any bytes were produced
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PackageError::UnresolvableLocation { .. }
                | PackageError::NoBundledRoot { .. }
                | PackageError::UnknownFormat(_)
        )
    }
}
