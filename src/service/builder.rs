//! Projection of stored submissions into deposit submissions

use super::error::{ProcessingError, ProcessingResult};
use crate::model::{DepositFile, DepositSubmission, File, Submission};
use pass_deposit_core_critical::{DocumentStore, ResourceStore};
use std::sync::Arc;

/// Builds the immutable packaging view of a submission
pub trait SubmissionBuilder: Send + Sync {
    fn build(&self, submission: &Submission) -> ProcessingResult<DepositSubmission>;
}

/// Reads the submission's File records from the store
pub struct StoreSubmissionBuilder {
    store: Arc<dyn DocumentStore>,
}

impl StoreSubmissionBuilder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl SubmissionBuilder for StoreSubmissionBuilder {
    fn build(&self, submission: &Submission) -> ProcessingResult<DepositSubmission> {
        let files = submission
            .files
            .iter()
            .map(|id| {
                let file: File = self.store.fetch(id)?;
                if file.location.trim().is_empty() {
                    return Err(ProcessingError::Build {
                        submission: submission.id.clone(),
                        message: format!("file '{}' has no location", file.id),
                    });
                }
                Ok(DepositFile {
                    name: file.name,
                    location: file.location,
                    role: file.role,
                    description: file.description,
                    mime_type: file.mime_type,
                })
            })
            .collect::<ProcessingResult<Vec<_>>>()?;

        let metadata = submission.metadata.clone();
        let name = metadata
            .manuscript
            .title
            .clone()
            .or_else(|| metadata.article.title.clone())
            .unwrap_or_else(|| submission.id.clone());

        Ok(DepositSubmission::new(
            submission.id.clone(),
            name,
            metadata,
            files,
        ))
    }
}
