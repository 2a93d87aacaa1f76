//! Submission, Repository and File records
//!
//! These are owned by the system-of-record. The deposit services only read
//! them and perform guarded writes of the submission status.

use super::metadata::{DepositMetadata, FileRole};
use super::status::AggregatedDepositStatus;
use pass_deposit_core_critical::StoredResource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,

    /// Set by the submitter once the submission is complete
    #[serde(default)]
    pub submitted: bool,

    #[serde(default)]
    pub aggregated_deposit_status: AggregatedDepositStatus,

    /// Ids of the target repositories
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Ids of the attached files, in submission order
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub metadata: DepositMetadata,

    #[serde(skip)]
    pub version: Option<u64>,
}

impl Submission {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted: false,
            aggregated_deposit_status: AggregatedDepositStatus::NotStarted,
            repositories: Vec::new(),
            files: Vec::new(),
            metadata: DepositMetadata::default(),
            version: None,
        }
    }
}

impl StoredResource for Submission {
    const KIND: &'static str = "submission";

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}

/// A target system descriptor. `name` selects the packager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip)]
    pub version: Option<u64>,
}

impl Repository {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: None,
            version: None,
        }
    }
}

impl StoredResource for Repository {
    const KIND: &'static str = "repository";

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}

/// A custodial file attached to a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub name: String,
    /// `file:`, `classpath:`, `http(s):` or a bare path
    pub location: String,
    #[serde(default)]
    pub role: FileRole,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub version: Option<u64>,
}

impl File {
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            role: FileRole::default(),
            description: None,
            mime_type: None,
            version: None,
        }
    }
}

impl StoredResource for File {
    const KIND: &'static str = "file";

    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = Some(version);
    }
}
