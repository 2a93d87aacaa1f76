//! Submission processing
//!
//! Claims a submission by moving it to `in-progress` with a critical
//! interaction, then creates one deposit per target repository and hands a
//! [`DepositTask`] for each to the executor.

use super::builder::SubmissionBuilder;
use super::error::{error_chain, ProcessingError, ProcessingResult};
use super::executor::TaskExecutor;
use super::registry::PackagerRegistry;
use super::task::DepositTask;
use crate::model::{
    AggregatedDepositStatus, Deposit, DepositStatus, DepositSubmission, Repository, Submission,
};
use crate::status::{DepositStatusProcessor, Policy, SubmissionPolicy};
use pass_deposit_core_critical::{
    CriticalError, CriticalRepositoryInteraction, CriticalResult, DocumentStore, ResourceStore,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const NO_FILES_ATTACHED: &str =
    "the DepositSubmission has no files attached! (Hint: check the incoming links to the Submission)";

/// Result of processing one submission event
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The submission was not eligible, typically already claimed elsewhere
    Skipped { reason: String },
    /// Deposit tasks were handed to the executor
    Dispatched(DispatchSummary),
}

#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Deposits whose task was dispatched
    pub dispatched: Vec<String>,
    /// Repositories that could not be dispatched, with the reason
    pub failed: Vec<(String, String)>,
}

pub struct SubmissionProcessor {
    critical: CriticalRepositoryInteraction<dyn DocumentStore>,
    builder: Arc<dyn SubmissionBuilder>,
    registry: Arc<PackagerRegistry>,
    status: Arc<DepositStatusProcessor>,
    executor: Arc<dyn TaskExecutor>,
}

impl SubmissionProcessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        builder: Arc<dyn SubmissionBuilder>,
        registry: Arc<PackagerRegistry>,
        status: Arc<DepositStatusProcessor>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        Self {
            critical: CriticalRepositoryInteraction::new(store),
            builder,
            registry,
            status,
            executor,
        }
    }

    pub fn executor(&self) -> &dyn TaskExecutor {
        self.executor.as_ref()
    }

    /// Process the "submission ready" event for `submission_id`
    ///
    /// A failure to claim the submission is returned to the caller so the
    /// event can be redelivered. Failures of individual repositories are
    /// logged and reported in the summary.
    pub fn process(&self, submission_id: &str) -> ProcessingResult<ProcessingOutcome> {
        let (submission, deposit_submission) = match self.claim(submission_id)? {
            Some(claimed) => claimed,
            None => {
                return Ok(ProcessingOutcome::Skipped {
                    reason: format!("submission '{submission_id}' is not eligible for deposit"),
                })
            }
        };

        info!(
            "Processing submission {} for {} repositories",
            submission.id,
            submission.repositories.len()
        );

        let mut summary = DispatchSummary::default();
        for repository_id in &submission.repositories {
            match self.dispatch(&submission, repository_id, &deposit_submission) {
                Ok(deposit_id) => summary.dispatched.push(deposit_id),
                Err(e) => {
                    error!(
                        "Unable to deposit submission {} into repository {}: {}",
                        submission.id,
                        repository_id,
                        error_chain(&e)
                    );
                    summary.failed.push((repository_id.clone(), e.to_string()));
                }
            }
        }
        Ok(ProcessingOutcome::Dispatched(summary))
    }

    /// Move the submission to `in-progress`, building its deposit view
    fn claim(
        &self,
        submission_id: &str,
    ) -> ProcessingResult<Option<(Submission, Arc<DepositSubmission>)>> {
        let result = self
            .critical
            .perform_critical::<Submission, Arc<DepositSubmission>, _, _, _>(
                submission_id,
                |s| {
                    if SubmissionPolicy.accept(s) {
                        Ok(())
                    } else {
                        Err(format!(
                            "submitted is {} and aggregated status is '{}'",
                            s.submitted, s.aggregated_deposit_status
                        ))
                    }
                },
                |s, ds| {
                    if s.aggregated_deposit_status != AggregatedDepositStatus::InProgress {
                        return Err(format!(
                            "expected status '{}' but actual status is '{}'",
                            AggregatedDepositStatus::InProgress,
                            s.aggregated_deposit_status
                        ));
                    }
                    if ds.files().is_empty() {
                        return Err(NO_FILES_ATTACHED.to_string());
                    }
                    Ok(())
                },
                |s| {
                    let ds = self.builder.build(s).map_err(|e| Box::new(e) as CriticalError)?;
                    s.aggregated_deposit_status = AggregatedDepositStatus::InProgress;
                    Ok(Arc::new(ds))
                },
            );

        match result {
            CriticalResult::Success { resource, value } => Ok(Some((resource, value))),
            CriticalResult::PreconditionFailed { reason, .. } => {
                debug!("Update precondition failed for {}: {}", submission_id, reason);
                Ok(None)
            }
            CriticalResult::PostconditionFailed { reason, .. } => {
                Err(ProcessingError::Postcondition {
                    kind: "submission",
                    id: submission_id.to_string(),
                    reason,
                })
            }
            CriticalResult::MutationFailed { cause, .. } => Err(ProcessingError::from_cause(
                "submission",
                submission_id,
                cause,
            )),
        }
    }

    /// Create the deposit for one repository and schedule its task
    fn dispatch(
        &self,
        submission: &Submission,
        repository_id: &str,
        deposit_submission: &Arc<DepositSubmission>,
    ) -> ProcessingResult<String> {
        let store = self.critical.store();
        let repository: Repository = store.fetch(repository_id)?;
        let deposit: Deposit = store.persist(&Deposit::new(&submission.id, &repository.id))?;
        debug!(
            "Created deposit {} for repository {} and submission {}",
            deposit.id, repository.id, submission.id
        );

        let Some(packager) = self.registry.get(&repository.name) else {
            self.fail_deposit(deposit);
            return Err(ProcessingError::MissingPackager {
                repository: repository.name,
            });
        };

        let task = DepositTask::new(
            deposit.id.clone(),
            Arc::clone(deposit_submission),
            packager,
            self.critical.clone(),
            Arc::clone(&self.status),
        );
        debug!("Submitting deposit task for deposit {}", deposit.id);
        self.executor.execute(Box::new(move || {
            // Outcomes are logged and recorded by the task itself
            let _ = task.run();
        }))?;
        Ok(deposit.id)
    }

    fn fail_deposit(&self, mut deposit: Deposit) {
        deposit.deposit_status = Some(DepositStatus::Failed);
        if let Err(e) = self.critical.store().persist(&deposit) {
            error!("Unable to mark deposit {} as failed: {}", deposit.id, e);
        }
    }
}
