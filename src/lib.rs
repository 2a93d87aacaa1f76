/*!
 * PASS Deposit - deposits scholarly submissions into target repositories
 *
 * - Claims submissions and deposits with optimistic check-then-act against a
 *   non-transactional record store
 * - Streams tar/gzip packages (NIHMS native, DSpace METS) through a bounded
 *   pipe, computing MD5 and SHA-256 per resource and per package
 * - Delivers packages over SWORD v2 (HTTP) or FTP
 * - Resolves and maps the remote status of each deposit
 */

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod package;
pub mod service;
pub mod status;
pub mod store;
pub mod transport;

// Re-export commonly used types
pub use config::DepositConfig;
pub use error::{DepositError, ErrorCategory, Result};
pub use model::{Deposit, DepositStatus, DepositSubmission, Repository, Submission};
pub use service::{PackagerRegistry, SubmissionProcessor};
pub use store::JsonDirStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
