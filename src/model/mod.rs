//! Records kept in the system-of-record store and the packaging projection
//! built from them

pub mod deposit;
pub mod metadata;
pub mod status;
pub mod submission;

pub use deposit::Deposit;
pub use metadata::{
    Article, DepositFile, DepositMetadata, DepositSubmission, FileRole, Journal,
    JournalPublicationType, Manuscript, Person, PersonRole,
};
pub use status::{AggregatedDepositStatus, DepositStatus, UnknownStatus};
pub use submission::{File, Repository, Submission};
