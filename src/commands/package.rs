//! `pass-deposit package`: assemble a package to a local file

use super::Runtime;
use crate::error::Result;
use crate::model::Submission;
use crate::package::{Metadata, PackageStream, Resource};
use crate::service::{StoreSubmissionBuilder, SubmissionBuilder};
use pass_deposit_core_critical::ResourceStore;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A package written to disk
#[derive(Debug)]
pub struct PackageReport {
    pub metadata: Metadata,
    pub resources: Vec<Resource>,
    pub bytes_written: u64,
}

impl PackageReport {
    pub fn print(&self) {
        println!(
            "{} ({}, {} bytes)",
            self.metadata.name(),
            self.metadata.spec(),
            self.bytes_written
        );
        for checksum in self.metadata.checksums() {
            println!("  {}: {}", checksum.algorithm(), checksum.as_hex());
        }
        for resource in &self.resources {
            println!(
                "  {}  {}  {} bytes",
                resource.name(),
                resource.mime_type(),
                resource.size_bytes()
            );
            for checksum in resource.checksums() {
                println!("      {}: {}", checksum.algorithm(), checksum.as_hex());
            }
        }
    }
}

/// Build the package `packager` would send for `submission_id` and write it
/// to `out`. The submission's status is not changed.
pub fn run(
    runtime: &Runtime,
    submission_id: &str,
    packager: &str,
    out: &Path,
) -> Result<PackageReport> {
    let packager = runtime.packager(packager)?;
    let submission: Submission = runtime.store.fetch(submission_id)?;
    let deposit_submission =
        StoreSubmissionBuilder::new(Arc::clone(&runtime.store)).build(&submission)?;

    let package = packager
        .assembler()
        .assemble(Arc::new(deposit_submission))?;

    let mut reader = package.open()?;
    let mut writer = BufWriter::new(File::create(out)?);
    let bytes_written = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    info!(
        "Wrote package {} for submission {} to {}",
        package.metadata().name(),
        submission_id,
        out.display()
    );

    Ok(PackageReport {
        metadata: package.metadata(),
        resources: package.resources(),
        bytes_written,
    })
}
