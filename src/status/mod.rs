//! Deposit status resolution
//!
//! After a package is sent the target system reports the state of the
//! deposit in its own vocabulary. A [`DepositStatusResolver`] turns the
//! deposit's status reference into a remote status URI; a [`StatusMapping`]
//! turns that URI into a [`DepositStatus`](crate::model::DepositStatus).

pub mod error;
pub mod mapping;
pub mod policy;
pub mod processor;
pub mod realm;
pub mod resolver;

pub use error::{StatusError, StatusResult};
pub use mapping::StatusMapping;
pub use policy::{
    is_terminal, DirtyDepositPolicy, IntermediateDepositStatusPolicy, Policy, SubmissionPolicy,
    TerminalDepositStatusPolicy,
};
pub use processor::DepositStatusProcessor;
pub use realm::AuthRealm;
pub use resolver::{DepositStatusResolver, HttpStatementResolver};
