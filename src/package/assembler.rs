//! Package assembly
//!
//! The [`Assembler`] binds a [`PackageFormat`] to a resource locator and the
//! assembly options of one packager. [`Assembler::assemble`] validates every
//! custodial location up front and returns an [`AssembledPackage`]; each
//! [`PackageStream::open`] on it starts one producer thread writing
//!
//! ```text
//! tar::Builder -> gzip -> ObservingWriter (package checksums) -> PipeWriter
//! ```
//!
//! Archive bytes are fully determined by the submission: entry headers carry
//! a fixed mtime and the gzip header has none, so repeated assemblies of the
//! same submission produce identical streams. This is what makes precomputed
//! package checksums valid for a later upload.

use super::checksum::{Algorithm, Observation, ObservingReader, ObservingWriter};
use super::error::{PackageError, PackageResult};
use super::format::PackageFormat;
use super::locator::{LocatedResource, ResourceLocator};
use super::pipe;
use super::{
    package_extension, Archive, Compression, Metadata, PackageStream, Resource,
};
use crate::model::{DepositFile, DepositSubmission};
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, warn};

/// Modification time stamped on every archive entry (2006-07-24T01:21:28Z)
pub const ARCHIVE_MTIME: u64 = 1_153_704_088;

const ENTRY_MODE: u32 = 0o644;

/// Per-packager assembly settings
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub compression: Compression,
    /// Algorithms computed for every resource and for the package; the first
    /// one is the primary checksum
    pub checksums: Vec<Algorithm>,
    /// Assemble once into a sink so the package size and checksums are known
    /// before the first upload starts
    pub precompute: bool,
    /// Bytes buffered between producer and consumer
    pub pipe_capacity: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
            checksums: vec![Algorithm::Md5, Algorithm::Sha256],
            precompute: false,
            pipe_capacity: pipe::DEFAULT_CAPACITY,
        }
    }
}

/// Keep only ASCII alphanumerics
pub fn sanitize(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn package_name(submission: &DepositSubmission, compression: Compression) -> String {
    let stem = [submission.name(), submission.id()]
        .into_iter()
        .map(sanitize)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "package".to_string());
    format!("{stem}{}", package_extension(Archive::Tar, compression))
}

pub struct Assembler {
    format: Arc<dyn PackageFormat>,
    locator: Arc<dyn ResourceLocator>,
    options: AssemblyOptions,
}

impl Assembler {
    pub fn new(
        format: Arc<dyn PackageFormat>,
        locator: Arc<dyn ResourceLocator>,
        options: AssemblyOptions,
    ) -> Self {
        Self {
            format,
            locator,
            options,
        }
    }

    pub fn format(&self) -> &dyn PackageFormat {
        self.format.as_ref()
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Prepare a package for `submission`
    ///
    /// Fails before any bytes are produced when a custodial location cannot
    /// be resolved.
    pub fn assemble(&self, submission: Arc<DepositSubmission>) -> PackageResult<AssembledPackage> {
        for file in submission.files() {
            self.locator.classify(&file.location)?;
        }

        let metadata = Metadata::builder()
            .name(package_name(&submission, self.options.compression))
            .spec(self.format.spec())
            .compression(self.options.compression)
            .archive(Archive::Tar)
            .build();

        let package = AssembledPackage {
            job: Arc::new(PackageJob {
                submission,
                format: Arc::clone(&self.format),
                locator: Arc::clone(&self.locator),
                options: self.options.clone(),
            }),
            state: Arc::new(Mutex::new(PackageState {
                metadata,
                resources: Vec::new(),
            })),
        };

        if self.options.precompute {
            package.measure()?;
        }
        Ok(package)
    }
}

struct PackageJob {
    submission: Arc<DepositSubmission>,
    format: Arc<dyn PackageFormat>,
    locator: Arc<dyn ResourceLocator>,
    options: AssemblyOptions,
}

struct PackageState {
    metadata: Metadata,
    resources: Vec<Resource>,
}

struct Assembly {
    resources: Vec<Resource>,
    package: Observation,
}

/// A package ready to be streamed
pub struct AssembledPackage {
    job: Arc<PackageJob>,
    state: Arc<Mutex<PackageState>>,
}

impl AssembledPackage {
    pub fn submission(&self) -> &DepositSubmission {
        &self.job.submission
    }

    /// Produce the whole package into a sink to learn its size and checksums
    pub fn measure(&self) -> PackageResult<()> {
        let (_, assembly) = write_package(io::sink(), &self.job, &|_: &PackageError| {})?;
        record(&self.state, assembly);
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&PackageState) -> T) -> T {
        match self.state.lock() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

fn record(state: &Mutex<PackageState>, assembly: Assembly) {
    let mut state = match state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };
    state.metadata = state
        .metadata
        .with_measurement(assembly.package.length, assembly.package.checksums);
    state.resources = assembly.resources;
}

impl PackageStream for AssembledPackage {
    fn metadata(&self) -> Metadata {
        self.with_state(|s| s.metadata.clone())
    }

    fn open(&self) -> PackageResult<Box<dyn Read + Send>> {
        let (writer, reader) = pipe::pipe(self.job.options.capacity_or_default());
        let closer = writer.closer();
        let job = Arc::clone(&self.job);
        let state = Arc::clone(&self.state);

        thread::Builder::new()
            .name("package-writer".to_string())
            .spawn(move || {
                let abort = |e: &PackageError| closer.abort(e);
                match write_package(writer, &job, &abort) {
                    Ok((writer, assembly)) => {
                        record(&state, assembly);
                        if let Err(e) = writer.finish() {
                            warn!(
                                "Package stream for submission {} closed early: {}",
                                job.submission.id(),
                                e
                            );
                        }
                    }
                    Err(e) => error!(
                        "Assembly of package for submission {} failed: {}",
                        job.submission.id(),
                        e
                    ),
                }
            })
            .map_err(|e| PackageError::Producer(e.to_string()))?;

        Ok(Box::new(reader))
    }

    fn resources(&self) -> Vec<Resource> {
        self.with_state(|s| s.resources.clone())
    }
}

impl AssemblyOptions {
    fn capacity_or_default(&self) -> usize {
        if self.pipe_capacity == 0 {
            pipe::DEFAULT_CAPACITY
        } else {
            self.pipe_capacity
        }
    }
}

/// Compression layer chosen at runtime
enum CompressedWriter<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    fn new(inner: W, compression: Compression) -> Self {
        match compression {
            Compression::None => CompressedWriter::Plain(inner),
            Compression::Gzip => CompressedWriter::Gzip(GzEncoder::new(inner, GzLevel::default())),
        }
    }

    fn finish(self) -> io::Result<W> {
        match self {
            CompressedWriter::Plain(inner) => Ok(inner),
            CompressedWriter::Gzip(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(inner) => inner.write(buf),
            CompressedWriter::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(inner) => inner.flush(),
            CompressedWriter::Gzip(encoder) => encoder.flush(),
        }
    }
}

type ArchiveWriter<W> = tar::Builder<CompressedWriter<ObservingWriter<W>>>;

/// Write a complete package into `sink`
///
/// `abort` runs before the archive layers are torn down on failure, so a
/// reader on the other end of a pipe sees the real cause rather than the
/// trailer bytes the layers emit when dropped.
fn write_package<W: Write>(
    sink: W,
    job: &PackageJob,
    abort: &dyn Fn(&PackageError),
) -> PackageResult<(W, Assembly)> {
    let observed = ObservingWriter::new(sink, &job.options.checksums);
    let mut archive = tar::Builder::new(CompressedWriter::new(observed, job.options.compression));

    let resources = match write_entries(&mut archive, job) {
        Ok(resources) => resources,
        Err(e) => {
            abort(&e);
            return Err(e);
        }
    };

    // Close the archive, then the compression layer, then hand the sink back
    let finished = archive
        .into_inner()
        .and_then(CompressedWriter::finish)
        .map_err(PackageError::Io);
    match finished {
        Ok(observed) => {
            let (sink, package) = observed.finish();
            debug!(
                "Assembled package for submission {}: {} entries, {} bytes",
                job.submission.id(),
                resources.len(),
                package.length
            );
            Ok((sink, Assembly { resources, package }))
        }
        Err(e) => {
            abort(&e);
            Err(e)
        }
    }
}

fn write_entries<W: Write>(
    archive: &mut ArchiveWriter<W>,
    job: &PackageJob,
) -> PackageResult<Vec<Resource>> {
    let algorithms = &job.options.checksums;
    let mut resources = Vec::with_capacity(job.submission.files().len() + 2);

    for file in job.submission.files() {
        let located = job.locator.open(&file.location)?;
        resources.push(append_custodial(archive, file, located, algorithms)?);
    }

    let entries = job.format.generated_entries(&job.submission, &resources);
    for serializer in entries {
        let name = serializer.entry_name().to_string();
        let mut content = Vec::new();
        serializer
            .serialize()
            .and_then(|mut reader| reader.read_to_end(&mut content))
            .map_err(|e| PackageError::Serialization {
                entry: name.clone(),
                message: e.to_string(),
            })?;
        let size = content.len() as u64;
        resources.push(append_entry(archive, &name, None, size, &content[..], algorithms)?);
    }

    Ok(resources)
}

fn append_custodial<W: Write>(
    archive: &mut ArchiveWriter<W>,
    file: &DepositFile,
    located: LocatedResource,
    algorithms: &[Algorithm],
) -> PackageResult<Resource> {
    let put_error = |source| PackageError::PutResource {
        name: file.name.clone(),
        source,
    };
    let mime_type = file.mime_type.as_deref();

    match located.size {
        Some(size) => append_entry(archive, &file.name, mime_type, size, located.reader, algorithms),
        None => {
            // The tar header needs the size up front, so spool this one resource
            let mut reader = located.reader;
            let mut spool = tempfile::tempfile().map_err(put_error)?;
            let size = io::copy(&mut reader, &mut spool).map_err(put_error)?;
            spool.seek(SeekFrom::Start(0)).map_err(put_error)?;
            append_entry(archive, &file.name, mime_type, size, spool, algorithms)
        }
    }
}

fn append_entry<W: Write, R: Read>(
    archive: &mut ArchiveWriter<W>,
    name: &str,
    mime_type: Option<&str>,
    size: u64,
    reader: R,
    algorithms: &[Algorithm],
) -> PackageResult<Resource> {
    let put_error = |source| PackageError::PutResource {
        name: name.to_string(),
        source,
    };

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size);
    header.set_mode(ENTRY_MODE);
    header.set_mtime(ARCHIVE_MTIME);

    let mut observed = ObservingReader::new(reader.take(size), algorithms);
    archive
        .append_data(&mut header, name, &mut observed)
        .map_err(put_error)?;

    let (rest, observation) = observed.finish();
    let extra = io::copy(&mut rest.into_inner(), &mut io::sink()).map_err(put_error)?;
    if observation.length != size || extra > 0 {
        return Err(PackageError::SizeMismatch {
            name: name.to_string(),
            declared: size,
            actual: observation.length + extra,
        });
    }

    let mut builder = Resource::builder(name)
        .size_bytes(observation.length)
        .checksums(observation.checksums);
    if let Some(mime_type) = mime_type {
        builder = builder.mime_type(mime_type);
    }
    Ok(builder.build())
}
