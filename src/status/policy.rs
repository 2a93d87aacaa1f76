//! Acceptance policies over submissions and deposit statuses

use crate::model::{AggregatedDepositStatus, DepositStatus, Submission};

/// Decides whether a value may be acted on
pub trait Policy<T: ?Sized> {
    fn accept(&self, value: &T) -> bool;
}

/// `Accepted` and `Rejected` are final; the target system will not change them
pub fn is_terminal(status: DepositStatus) -> bool {
    matches!(status, DepositStatus::Accepted | DepositStatus::Rejected)
}

/// Accepts unset or non-terminal deposit statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct IntermediateDepositStatusPolicy;

impl Policy<Option<DepositStatus>> for IntermediateDepositStatusPolicy {
    fn accept(&self, status: &Option<DepositStatus>) -> bool {
        status.map_or(true, |s| !is_terminal(s))
    }
}

/// Accepts only terminal deposit statuses
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalDepositStatusPolicy;

impl Policy<Option<DepositStatus>> for TerminalDepositStatusPolicy {
    fn accept(&self, status: &Option<DepositStatus>) -> bool {
        status.is_some_and(is_terminal)
    }
}

/// A deposit is dirty while it has never been sent, i.e. its status is unset
#[derive(Debug, Clone, Copy, Default)]
pub struct DirtyDepositPolicy;

impl Policy<Option<DepositStatus>> for DirtyDepositPolicy {
    fn accept(&self, status: &Option<DepositStatus>) -> bool {
        status.is_none()
    }
}

/// A submission is processed once: submitted by the user and not yet started
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionPolicy;

impl Policy<Submission> for SubmissionPolicy {
    fn accept(&self, submission: &Submission) -> bool {
        submission.submitted
            && submission.aggregated_deposit_status == AggregatedDepositStatus::NotStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DepositStatus; 4] = [
        DepositStatus::Submitted,
        DepositStatus::Accepted,
        DepositStatus::Rejected,
        DepositStatus::Failed,
    ];

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = ALL.into_iter().filter(|s| is_terminal(*s)).collect();
        assert_eq!(terminal, vec![DepositStatus::Accepted, DepositStatus::Rejected]);
    }

    #[test]
    fn test_intermediate_policy_is_complement_of_terminal() {
        let policy = IntermediateDepositStatusPolicy;
        assert!(policy.accept(&None));
        for status in ALL {
            assert_eq!(policy.accept(&Some(status)), !is_terminal(status));
            assert_eq!(
                TerminalDepositStatusPolicy.accept(&Some(status)),
                is_terminal(status)
            );
        }
        assert!(!TerminalDepositStatusPolicy.accept(&None));
    }

    #[test]
    fn test_dirty_policy() {
        assert!(DirtyDepositPolicy.accept(&None));
        for status in ALL {
            assert!(!DirtyDepositPolicy.accept(&Some(status)));
        }
    }

    #[test]
    fn test_submission_policy() {
        let mut submission = Submission::new("s1");
        assert!(!SubmissionPolicy.accept(&submission));

        submission.submitted = true;
        assert!(SubmissionPolicy.accept(&submission));

        submission.aggregated_deposit_status = AggregatedDepositStatus::InProgress;
        assert!(!SubmissionPolicy.accept(&submission));
    }
}
