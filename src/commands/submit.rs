//! `pass-deposit submit`: process a "submission ready" event

use super::Runtime;
use crate::error::Result;
use crate::model::{Deposit, DepositStatus};
use crate::service::{
    ProcessingOutcome, StoreSubmissionBuilder, SubmissionProcessor, TaskExecutor, WorkerPool,
};
use pass_deposit_core_critical::ResourceStore;
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to one submission
#[derive(Debug)]
pub struct SubmitReport {
    pub submission: String,
    /// Why nothing was dispatched, when the submission was not eligible
    pub skipped: Option<String>,
    /// State of every dispatched deposit once its task finished
    pub deposits: Vec<Deposit>,
    /// Repositories that never got a task, with the reason
    pub failed: Vec<(String, String)>,
}

impl SubmitReport {
    /// True when every repository ended up with a deposit that was not failed
    pub fn complete(&self) -> bool {
        self.failed.is_empty()
            && self
                .deposits
                .iter()
                .all(|d| d.deposit_status != Some(DepositStatus::Failed))
    }

    pub fn print(&self) {
        if let Some(reason) = &self.skipped {
            println!("Submission {} skipped: {}", self.submission, reason);
            return;
        }
        println!("Submission {}", self.submission);
        for deposit in &self.deposits {
            println!(
                "  deposit {} -> repository {}: {}{}",
                deposit.id,
                deposit.repository,
                deposit
                    .deposit_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "pending".to_string()),
                deposit
                    .deposit_status_ref
                    .as_deref()
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default()
            );
        }
        for (repository, reason) in &self.failed {
            println!("  repository {}: not dispatched: {}", repository, reason);
        }
    }
}

/// Claim the submission, deposit it into every target repository and wait
/// for the deposit tasks to finish
pub fn run(runtime: &Runtime, submission_id: &str) -> Result<SubmitReport> {
    let executor: Arc<dyn TaskExecutor> =
        Arc::new(WorkerPool::new(runtime.config.workers.pool_size)?);
    let processor = SubmissionProcessor::new(
        Arc::clone(&runtime.store),
        Arc::new(StoreSubmissionBuilder::new(Arc::clone(&runtime.store))),
        Arc::clone(&runtime.registry),
        Arc::clone(&runtime.status),
        executor,
    );
    process(runtime, &processor, submission_id)
}

/// Run `processor` for one submission and collect the resulting deposits
pub fn process(
    runtime: &Runtime,
    processor: &SubmissionProcessor,
    submission_id: &str,
) -> Result<SubmitReport> {
    let summary = match processor.process(submission_id)? {
        ProcessingOutcome::Skipped { reason } => {
            info!("Submission {} skipped: {}", submission_id, reason);
            return Ok(SubmitReport {
                submission: submission_id.to_string(),
                skipped: Some(reason),
                deposits: Vec::new(),
                failed: Vec::new(),
            });
        }
        ProcessingOutcome::Dispatched(summary) => summary,
    };

    processor.executor().wait_idle();

    let mut deposits = Vec::with_capacity(summary.dispatched.len());
    for id in &summary.dispatched {
        match runtime.store.fetch::<Deposit>(id) {
            Ok(deposit) => deposits.push(deposit),
            Err(e) => warn!("Unable to read back deposit {}: {}", id, e),
        }
    }

    Ok(SubmitReport {
        submission: submission_id.to_string(),
        skipped: None,
        deposits,
        failed: summary.failed,
    })
}
