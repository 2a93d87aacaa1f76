//! Streaming package assembly
//!
//! A package is a single compressed archive holding the custodial files of a
//! submission followed by format-specific generated entries (manifests,
//! descriptive metadata). Packages are never materialized in full: each call
//! to [`PackageStream::open`] starts a producer thread that writes the archive
//! into a bounded pipe while the caller reads the other end.

pub mod assembler;
pub mod checksum;
pub mod error;
pub mod format;
pub mod locator;
pub mod pipe;

pub use assembler::{AssembledPackage, Assembler, AssemblyOptions};
pub use checksum::{Algorithm, Checksum, ChecksumObserver, ObservingReader, ObservingWriter};
pub use error::{PackageError, PackageResult};
pub use format::{PackageFormat, StreamingSerializer};
pub use locator::{Cataloger, LocatedResource, Location, ResourceLocator};

use serde::{Deserialize, Serialize};
use std::io::Read;

/// Compression applied to the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

/// Archive container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Archive {
    #[default]
    Tar,
}

/// File name extension for an archive with the given compression
pub fn package_extension(archive: Archive, compression: Compression) -> &'static str {
    match (archive, compression) {
        (Archive::Tar, Compression::None) => ".tar",
        (Archive::Tar, Compression::Gzip) => ".tar.gz",
    }
}

/// Mime type for an archive with the given compression
pub fn package_mime_type(archive: Archive, compression: Compression) -> &'static str {
    match (archive, compression) {
        (Archive::Tar, Compression::None) => "application/x-tar",
        (Archive::Tar, Compression::Gzip) => "application/gzip",
    }
}

/// Describes a whole package
///
/// Sizes and checksums are only present once they are known: either because
/// they were precomputed at assembly time or because a stream over the
/// package has been consumed to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    name: String,
    spec: String,
    mime_type: String,
    size_bytes: Option<u64>,
    compression: Compression,
    archive: Archive,
    checksums: Vec<Checksum>,
}

impl Metadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Suggested file name of the package
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Packaging specification identifier
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn compressed(&self) -> bool {
        self.compression != Compression::None
    }

    pub fn archive(&self) -> Archive {
        self.archive
    }

    /// The primary checksum (the first one computed)
    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksums.first()
    }

    pub fn checksums(&self) -> &[Checksum] {
        &self.checksums
    }

    pub fn checksum_for(&self, algorithm: Algorithm) -> Option<&Checksum> {
        self.checksums.iter().find(|c| c.algorithm() == algorithm)
    }

    /// A copy of this metadata with the measured size and checksums
    pub(crate) fn with_measurement(&self, size_bytes: u64, checksums: Vec<Checksum>) -> Self {
        Self {
            size_bytes: Some(size_bytes),
            checksums,
            ..self.clone()
        }
    }
}

#[derive(Debug, Default)]
pub struct MetadataBuilder {
    name: Option<String>,
    spec: Option<String>,
    mime_type: Option<String>,
    size_bytes: Option<u64>,
    compression: Compression,
    archive: Archive,
    checksums: Vec<Checksum>,
}

impl MetadataBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size_bytes(mut self, size: u64) -> Self {
        self.size_bytes = Some(size);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn archive(mut self, archive: Archive) -> Self {
        self.archive = archive;
        self
    }

    pub fn checksum(mut self, checksum: Checksum) -> Self {
        self.checksums.push(checksum);
        self
    }

    pub fn build(self) -> Metadata {
        Metadata {
            name: self.name.unwrap_or_default(),
            spec: self.spec.unwrap_or_default(),
            mime_type: self
                .mime_type
                .unwrap_or_else(|| package_mime_type(self.archive, self.compression).to_string()),
            size_bytes: self.size_bytes,
            compression: self.compression,
            archive: self.archive,
            checksums: self.checksums,
        }
    }
}

/// One entry of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    name: String,
    mime_type: String,
    size_bytes: u64,
    checksums: Vec<Checksum>,
}

impl Resource {
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            name: name.into(),
            mime_type: None,
            size_bytes: 0,
            checksums: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksums.first()
    }

    pub fn checksums(&self) -> &[Checksum] {
        &self.checksums
    }

    pub fn checksum_for(&self, algorithm: Algorithm) -> Option<&Checksum> {
        self.checksums.iter().find(|c| c.algorithm() == algorithm)
    }
}

/// Builder for a single [`Resource`], consumed by [`ResourceBuilder::build`]
#[derive(Debug)]
pub struct ResourceBuilder {
    name: String,
    mime_type: Option<String>,
    size_bytes: u64,
    checksums: Vec<Checksum>,
}

impl ResourceBuilder {
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size_bytes(mut self, size: u64) -> Self {
        self.size_bytes = size;
        self
    }

    pub fn checksums(mut self, checksums: Vec<Checksum>) -> Self {
        self.checksums.extend(checksums);
        self
    }

    pub fn build(self) -> Resource {
        let mime_type = self.mime_type.unwrap_or_else(|| {
            mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        Resource {
            name: self.name,
            mime_type,
            size_bytes: self.size_bytes,
            checksums: self.checksums,
        }
    }
}

/// A package that can be streamed
pub trait PackageStream: Send + Sync {
    /// Package metadata as currently known
    fn metadata(&self) -> Metadata;

    /// Start producing the package and return the read end of the stream
    ///
    /// Each call starts exactly one producer. The returned reader must be
    /// consumed by a single reader; a failure on the producer side surfaces
    /// as a read error.
    fn open(&self) -> PackageResult<Box<dyn Read + Send>>;

    /// Entries of the package in archive order
    ///
    /// Empty until the package has been measured (precomputed, or a stream
    /// consumed to the end).
    fn resources(&self) -> Vec<Resource>;
}
