//! One deposit of one submission into one repository

use super::error::{error_chain, ProcessingError, ProcessingResult};
use super::registry::Packager;
use crate::model::{Deposit, DepositStatus, DepositSubmission};
use crate::package::PackageStream;
use crate::status::{
    DepositStatusProcessor, DirtyDepositPolicy, IntermediateDepositStatusPolicy, Policy,
};
use crate::transport::{DepositReceipt, SessionGuard};
use pass_deposit_core_critical::{
    CriticalError, CriticalRepositoryInteraction, CriticalResult, DocumentStore,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};

/// What became of a deposit task
#[derive(Debug)]
pub enum DepositOutcome {
    /// The package was delivered and the deposit recorded as submitted
    Submitted {
        deposit: Deposit,
        receipt: Option<DepositReceipt>,
    },
    /// The deposit was no longer dirty, another worker got there first
    Skipped { reason: String },
}

fn boxed(error: impl Into<ProcessingError>) -> CriticalError {
    Box::new(error.into())
}

/// Assembles a package and sends it for a single deposit
pub struct DepositTask {
    deposit_id: String,
    submission: Arc<DepositSubmission>,
    packager: Arc<Packager>,
    critical: CriticalRepositoryInteraction<dyn DocumentStore>,
    status: Arc<DepositStatusProcessor>,
}

impl DepositTask {
    pub fn new(
        deposit_id: impl Into<String>,
        submission: Arc<DepositSubmission>,
        packager: Arc<Packager>,
        critical: CriticalRepositoryInteraction<dyn DocumentStore>,
        status: Arc<DepositStatusProcessor>,
    ) -> Self {
        Self {
            deposit_id: deposit_id.into(),
            submission,
            packager,
            critical,
            status,
        }
    }

    pub fn deposit_id(&self) -> &str {
        &self.deposit_id
    }

    /// Run the task; any failure marks the deposit failed
    pub fn run(&self) -> ProcessingResult<DepositOutcome> {
        let span = info_span!(
            "deposit",
            submission = %self.submission.id(),
            repository = %self.packager.name(),
            deposit = %self.deposit_id
        );
        let _enter = span.enter();

        match self.deposit() {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Deposit failed: {}", error_chain(&e));
                self.mark_failed();
                Err(e)
            }
        }
    }

    fn deposit(&self) -> ProcessingResult<DepositOutcome> {
        let result = self.critical.perform_critical::<Deposit, Option<DepositReceipt>, _, _, _>(
            &self.deposit_id,
            |deposit| {
                if DirtyDepositPolicy.accept(&deposit.deposit_status) {
                    Ok(())
                } else {
                    Err(format!(
                        "deposit is not dirty (status is {})",
                        deposit
                            .deposit_status
                            .map(|s| s.to_string())
                            .unwrap_or_default()
                    ))
                }
            },
            |deposit, _| match deposit.deposit_status {
                Some(DepositStatus::Submitted) => Ok(()),
                other => Err(format!(
                    "expected status 'submitted', found '{}'",
                    other.map(|s| s.to_string()).unwrap_or_default()
                )),
            },
            |deposit| {
                let receipt = self.send().map_err(boxed)?;
                deposit.deposit_status = Some(DepositStatus::Submitted);
                deposit.deposit_status_ref = receipt.as_ref().and_then(|r| r.statement_ref.clone());
                Ok(receipt)
            },
        );

        let (deposit, receipt) = match result {
            CriticalResult::Success { resource, value } => (resource, value),
            CriticalResult::PreconditionFailed { reason, .. } => {
                info!("Skipping deposit: {}", reason);
                return Ok(DepositOutcome::Skipped { reason });
            }
            CriticalResult::PostconditionFailed { reason, .. } => {
                return Err(ProcessingError::Postcondition {
                    kind: "deposit",
                    id: self.deposit_id.clone(),
                    reason,
                })
            }
            CriticalResult::MutationFailed { cause, .. } => {
                return Err(ProcessingError::from_cause("deposit", &self.deposit_id, cause))
            }
        };

        info!(
            "Deposited '{}' (status reference: {})",
            self.submission.name(),
            deposit.deposit_status_ref.as_deref().unwrap_or("none")
        );

        let deposit = if self.packager.resolve_status() {
            match self.refresh_status() {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) => deposit,
                Err(e) => {
                    warn!("Unable to resolve deposit status: {}", error_chain(&e));
                    deposit
                }
            }
        } else {
            deposit
        };

        Ok(DepositOutcome::Submitted { deposit, receipt })
    }

    /// Assemble, open a session, send and close
    fn send(&self) -> ProcessingResult<Option<DepositReceipt>> {
        let package = self
            .packager
            .assembler()
            .assemble(Arc::clone(&self.submission))?;
        let metadata = package.metadata();
        debug!(
            "Assembled package '{}' ({} bytes)",
            metadata.name(),
            metadata
                .size_bytes()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        let hints = self.packager.hints();
        let mut session = SessionGuard::new(self.packager.transport().open(hints)?);
        let response = session.send(&package, hints);
        if let Err(e) = session.close() {
            warn!("Error closing transport session: {}", e);
        }
        response.into_result().map_err(ProcessingError::from)
    }

    /// Resolve and record the status of this task's deposit
    pub fn refresh_status(&self) -> ProcessingResult<Option<Deposit>> {
        refresh_deposit_status(&self.critical, &self.status, &self.packager, &self.deposit_id)
    }

    fn mark_failed(&self) {
        let result = self.critical.perform_critical::<Deposit, (), _, _, _>(
            &self.deposit_id,
            |deposit| {
                if IntermediateDepositStatusPolicy.accept(&deposit.deposit_status) {
                    Ok(())
                } else {
                    Err("deposit status is already terminal".to_string())
                }
            },
            |deposit, _| match deposit.deposit_status {
                Some(DepositStatus::Failed) => Ok(()),
                _ => Err("expected status 'failed'".to_string()),
            },
            |deposit| {
                deposit.deposit_status = Some(DepositStatus::Failed);
                Ok(())
            },
        );
        if !result.success() {
            warn!("Unable to mark deposit {} as failed: {:?}", self.deposit_id, result);
        }
    }
}

/// Resolve a deposit's status reference and record the mapped status
///
/// `Ok(None)` when the deposit's status is already terminal or the remote
/// status is unknown; the stored deposit is then left as it was.
pub fn refresh_deposit_status(
    critical: &CriticalRepositoryInteraction<dyn DocumentStore>,
    processor: &DepositStatusProcessor,
    packager: &Packager,
    deposit_id: &str,
) -> ProcessingResult<Option<Deposit>> {
    let result = critical.perform_critical::<Deposit, Option<DepositStatus>, _, _, _>(
        deposit_id,
        |deposit| {
            if IntermediateDepositStatusPolicy.accept(&deposit.deposit_status) {
                Ok(())
            } else {
                Err("deposit status is already terminal".to_string())
            }
        },
        |deposit, resolved| match resolved {
            Some(status) if deposit.deposit_status != Some(*status) => Err(format!(
                "expected status '{}', found '{}'",
                status,
                deposit
                    .deposit_status
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            )),
            _ => Ok(()),
        },
        |deposit| {
            let resolved = processor
                .process(deposit, packager.realms(), packager.status_mapping())
                .map_err(boxed)?;
            if let Some(status) = resolved {
                deposit.deposit_status = Some(status);
            }
            Ok(resolved)
        },
    );

    match result {
        CriticalResult::Success {
            resource,
            value: Some(status),
        } => {
            info!("Deposit {} status is now {}", deposit_id, status);
            Ok(Some(resource))
        }
        CriticalResult::Success { value: None, .. } => Ok(None),
        CriticalResult::PreconditionFailed { reason, .. } => {
            debug!("Not refreshing deposit {}: {}", deposit_id, reason);
            Ok(None)
        }
        CriticalResult::PostconditionFailed { reason, .. } => Err(ProcessingError::Postcondition {
            kind: "deposit",
            id: deposit_id.to_string(),
            reason,
        }),
        CriticalResult::MutationFailed { cause, .. } => {
            Err(ProcessingError::from_cause("deposit", deposit_id, cause))
        }
    }
}
