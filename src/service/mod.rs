//! Deposit services
//!
//! The [`SubmissionProcessor`] consumes "submission ready" events, claims the
//! submission and fans out one [`DepositTask`] per target repository onto a
//! [`TaskExecutor`]. Packagers are looked up by repository name in the
//! [`PackagerRegistry`].

pub mod builder;
pub mod error;
pub mod executor;
pub mod processor;
pub mod registry;
pub mod task;

pub use builder::{StoreSubmissionBuilder, SubmissionBuilder};
pub use error::{error_chain, ProcessingError, ProcessingResult};
pub use executor::{InlineExecutor, Job, TaskExecutor, WorkerPool};
pub use processor::{DispatchSummary, ProcessingOutcome, SubmissionProcessor, NO_FILES_ATTACHED};
pub use registry::{Packager, PackagerRegistry, RegistryError, TransportFactory};
pub use task::{refresh_deposit_status, DepositOutcome, DepositTask};
