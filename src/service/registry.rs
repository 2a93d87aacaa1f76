//! Packager registry
//!
//! A packager binds a repository name to an assembler, a transport and the
//! transport hints for that repository. Transports are created through
//! factories keyed by the `deposit.transport.protocol` hint, so custom
//! protocols can be registered next to the built-in ones.

use crate::config::PackagerConfig;
use crate::package::{format, Assembler, ResourceLocator};
use crate::status::{AuthRealm, StatusMapping};
use crate::transport::{
    keys, FtpTransport, Sword2Transport, Transport, TransportError, TransportHints,
    TransportResult,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Factory function type for creating transports
pub type TransportFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Everything needed to deposit into one target repository
pub struct Packager {
    name: String,
    assembler: Assembler,
    transport: Arc<dyn Transport>,
    hints: TransportHints,
    realms: Vec<AuthRealm>,
    status_mapping: StatusMapping,
    resolve_status: bool,
}

impl Packager {
    pub fn new(
        name: impl Into<String>,
        assembler: Assembler,
        transport: Arc<dyn Transport>,
        hints: TransportHints,
    ) -> Self {
        Self {
            name: name.into(),
            assembler,
            transport,
            hints,
            realms: Vec::new(),
            status_mapping: StatusMapping::default(),
            resolve_status: false,
        }
    }

    pub fn with_realms(mut self, realms: Vec<AuthRealm>) -> Self {
        self.realms = realms;
        self
    }

    pub fn with_status_mapping(mut self, mapping: StatusMapping) -> Self {
        self.status_mapping = mapping;
        self
    }

    pub fn with_resolve_status(mut self, resolve: bool) -> Self {
        self.resolve_status = resolve;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn hints(&self) -> &TransportHints {
        &self.hints
    }

    pub fn realms(&self) -> &[AuthRealm] {
        &self.realms
    }

    pub fn status_mapping(&self) -> &StatusMapping {
        &self.status_mapping
    }

    pub fn resolve_status(&self) -> bool {
        self.resolve_status
    }
}

impl fmt::Debug for Packager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packager")
            .field("name", &self.name)
            .field("format", &self.assembler.format().name())
            .field("protocol", &self.transport.protocol())
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

/// Packagers by repository name, plus the transport factories used to build them
pub struct PackagerRegistry {
    packagers: RwLock<HashMap<String, Arc<Packager>>>,
    transports: RwLock<HashMap<String, TransportFactory>>,
}

impl fmt::Debug for PackagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut packagers: Vec<String> = self
            .packagers
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        packagers.sort();
        let mut protocols: Vec<String> = self
            .transports
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        protocols.sort();
        f.debug_struct("PackagerRegistry")
            .field("packagers", &packagers)
            .field("protocols", &protocols)
            .finish()
    }
}

impl PackagerRegistry {
    /// Create a registry with the built-in transports and no packagers
    pub fn new() -> Self {
        let registry = Self {
            packagers: RwLock::new(HashMap::new()),
            transports: RwLock::new(HashMap::new()),
        };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&self) {
        let sword: TransportFactory =
            Arc::new(|| -> Arc<dyn Transport> { Arc::new(Sword2Transport::http()) });
        for protocol in ["sword2", "swordv2", "http", "https"] {
            self.register_transport(protocol, Arc::clone(&sword));
        }
        self.register_transport(
            "ftp",
            Arc::new(|| -> Arc<dyn Transport> { Arc::new(FtpTransport::native()) }),
        );
    }

    /// Register a transport factory for a protocol name (case-insensitive)
    pub fn register_transport(&self, protocol: &str, factory: TransportFactory) {
        if let Ok(mut transports) = self.transports.write() {
            transports.insert(protocol.to_ascii_lowercase(), factory);
        }
    }

    /// Create the transport registered for `protocol`
    pub fn transport(&self, protocol: &str) -> TransportResult<Arc<dyn Transport>> {
        let transports = self
            .transports
            .read()
            .map_err(|_| TransportError::UnsupportedProtocol(protocol.to_string()))?;
        transports
            .get(&protocol.to_ascii_lowercase())
            .map(|factory| factory())
            .ok_or_else(|| TransportError::UnsupportedProtocol(protocol.to_string()))
    }

    pub fn register(&self, packager: Packager) {
        debug!("Registering packager {:?}", packager);
        if let Ok(mut packagers) = self.packagers.write() {
            packagers.insert(packager.name().to_string(), Arc::new(packager));
        }
    }

    /// Packager for a repository name
    pub fn get(&self, repository: &str) -> Option<Arc<Packager>> {
        self.packagers.read().ok()?.get(repository).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .packagers
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Build a packager from its configuration
    pub fn build_packager(
        &self,
        name: &str,
        config: &PackagerConfig,
        locator: Arc<dyn ResourceLocator>,
    ) -> Result<Packager, RegistryError> {
        let format = format::by_name(&config.format)?;
        let protocol = config.hints.require(keys::PROTOCOL)?;
        let transport = self.transport(protocol)?;
        let assembler = Assembler::new(format, locator, config.assembly_options());

        Ok(Packager::new(name, assembler, transport, config.hints.clone())
            .with_realms(config.realms())
            .with_status_mapping(config.status_mapping.clone())
            .with_resolve_status(config.resolve_status))
    }

    /// Registry holding one packager per configured repository
    pub fn from_config(
        packagers: &BTreeMap<String, PackagerConfig>,
        locator: Arc<dyn ResourceLocator>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for (name, config) in packagers {
            let packager = registry
                .build_packager(name, config, Arc::clone(&locator))
                .map_err(|e| e.for_packager(name))?;
            registry.register(packager);
        }
        Ok(registry)
    }
}

impl Default for PackagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Package(#[from] crate::package::PackageError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Packager '{name}': {source}")]
    Packager {
        name: String,
        #[source]
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    fn for_packager(self, name: &str) -> Self {
        RegistryError::Packager {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DepositConfig;
    use crate::package::Cataloger;

    fn locator() -> Arc<dyn ResourceLocator> {
        Arc::new(Cataloger::new(None))
    }

    #[test]
    fn test_builtin_transports() {
        let registry = PackagerRegistry::new();
        assert_eq!(registry.transport("SWORD2").unwrap().protocol(), "sword2");
        assert_eq!(registry.transport("https").unwrap().protocol(), "sword2");
        assert_eq!(registry.transport("ftp").unwrap().protocol(), "ftp");
        assert!(matches!(
            registry.transport("gopher"),
            Err(TransportError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = DepositConfig::from_toml_str(
            r#"
[packagers.PMC]
format = "nihms-native"
resolve_status = false
[packagers.PMC.hints]
"deposit.transport.protocol" = "ftp"

[packagers.JScholarship]
format = "dspace-mets"
resolve_status = true
[packagers.JScholarship.hints]
"deposit.transport.protocol" = "sword2"
"#,
        )
        .unwrap();

        let registry = PackagerRegistry::from_config(&config.packagers, locator()).unwrap();
        assert_eq!(registry.names(), vec!["JScholarship", "PMC"]);

        let pmc = registry.get("PMC").unwrap();
        assert_eq!(pmc.assembler().format().name(), "nihms-native");
        assert_eq!(pmc.transport().protocol(), "ftp");
        assert!(!pmc.resolve_status());

        let jscholarship = registry.get("JScholarship").unwrap();
        assert!(jscholarship.resolve_status());
        assert!(registry.get("eRA Commons").is_none());
    }

    #[test]
    fn test_unknown_protocol_names_packager() {
        let config: DepositConfig = toml::from_str(
            r#"
[packagers.Custom]
format = "nihms-native"
[packagers.Custom.hints]
"deposit.transport.protocol" = "gopher"
"#,
        )
        .unwrap();
        let err = PackagerRegistry::from_config(&config.packagers, locator()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Custom"));
        assert!(message.contains("gopher"));
    }

    #[test]
    fn test_debug_lists_packagers_and_protocols() {
        let registry = PackagerRegistry::new();
        let debug = format!("{:?}", registry);
        assert!(debug.contains("packagers: []"), "{}", debug);
        assert!(debug.contains("\"ftp\""), "{}", debug);
        assert!(debug.contains("\"sword2\""), "{}", debug);
    }
}
