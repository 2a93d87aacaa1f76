//! Deposit records

use super::status::DepositStatus;
use chrono::{DateTime, Utc};
use pass_deposit_core_critical::StoredResource;
use serde::{Deserialize, Serialize};

/// One attempt to place a submission into one target repository
///
/// Created when the attempt starts with no status, then updated when the
/// package is sent and again when the remote status is resolved. Never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub submission: String,
    pub repository: String,
    #[serde(default)]
    pub deposit_status: Option<DepositStatus>,
    /// Opaque status document reference handed out by the target system
    #[serde(default)]
    pub deposit_status_ref: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(skip)]
    pub version: Option<u64>,
}

impl Deposit {
    pub fn new(submission: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission: submission.into(),
            repository: repository.into(),
            deposit_status: None,
            deposit_status_ref: None,
            created: Utc::now(),
            version: None,
        }
    }
}

impl StoredResource for Deposit {
    const KIND: &'static str = "deposit";

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
