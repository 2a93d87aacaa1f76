//! Command implementations for the `pass-deposit` binary
//!
//! Each command works against a [`Runtime`] assembled from the loaded
//! configuration: the document store, the packager registry and the status
//! processor.

pub mod package;
pub mod status;
pub mod submit;

use crate::config::DepositConfig;
use crate::error::Result;
use crate::package::{Cataloger, ResourceLocator};
use crate::service::{PackagerRegistry, ProcessingError};
use crate::status::{DepositStatusProcessor, DepositStatusResolver, HttpStatementResolver};
use crate::store::JsonDirStore;
use pass_deposit_core_critical::DocumentStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Shared state for one invocation of the binary
pub struct Runtime {
    pub config: DepositConfig,
    pub store: Arc<dyn DocumentStore>,
    pub registry: Arc<PackagerRegistry>,
    pub status: Arc<DepositStatusProcessor>,
}

impl Runtime {
    /// Open the store and build every configured packager
    ///
    /// `store_override` replaces `store.path` from the configuration.
    pub fn new(config: DepositConfig, store_override: Option<PathBuf>) -> Result<Self> {
        let store_path = store_override.unwrap_or_else(|| config.store.path.clone());
        debug!("Opening document store at {}", store_path.display());
        let store: Arc<dyn DocumentStore> = Arc::new(JsonDirStore::open(store_path)?);

        let resolver: Arc<dyn DepositStatusResolver> = Arc::new(HttpStatementResolver::new());
        Self::with_parts(config, store, resolver)
    }

    /// Build a runtime over an existing store and status resolver
    pub fn with_parts(
        config: DepositConfig,
        store: Arc<dyn DocumentStore>,
        resolver: Arc<dyn DepositStatusResolver>,
    ) -> Result<Self> {
        let locator: Arc<dyn ResourceLocator> =
            Arc::new(Cataloger::new(config.locator.bundled_root.clone()));
        let registry = PackagerRegistry::from_config(&config.packagers, locator)?;
        debug!("Configured packagers: {:?}", registry.names());

        Ok(Self {
            config,
            store,
            registry: Arc::new(registry),
            status: Arc::new(DepositStatusProcessor::new(resolver)),
        })
    }

    /// The packager registered under `name`
    pub fn packager(&self, name: &str) -> Result<Arc<crate::service::Packager>> {
        self.registry.get(name).ok_or_else(|| {
            ProcessingError::MissingPackager {
                repository: name.to_string(),
            }
            .into()
        })
    }
}
