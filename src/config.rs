/*!
 * Configuration types for the deposit services
 */

use crate::package::{format, Algorithm, AssemblyOptions, Compression};
use crate::status::{AuthRealm, StatusMapping};
use crate::transport::{keys, TransportHints};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub locator: LocatorConfig,

    /// Packagers keyed by the name of the repository they deposit into
    #[serde(default)]
    pub packagers: BTreeMap<String, PackagerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Write JSON lines to this file instead of compact output on stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Shorthand for `level = "debug"`
    #[serde(default)]
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn effective_level(&self) -> LogLevel {
        if self.verbose && self.level < LogLevel::Debug {
            LogLevel::Debug
        } else {
            self.level
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent deposit tasks (0 = available parallelism)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root of the JSON document store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Root directory for `classpath:` locations
    #[serde(default)]
    pub bundled_root: Option<PathBuf>,
}

/// Binds a repository to a package format, a transport and its hints
#[derive(Clone, Serialize, Deserialize)]
pub struct PackagerConfig {
    /// `nihms-native` or `dspace-mets`
    pub format: String,

    #[serde(default)]
    pub compression: Compression,

    #[serde(default = "default_checksums")]
    pub checksums: Vec<Algorithm>,

    /// Measure the package before sending so size and MD5 are known up front
    #[serde(default = "default_true")]
    pub precompute_checksums: bool,

    /// Resolve the deposit status right after a successful send
    #[serde(default)]
    pub resolve_status: bool,

    #[serde(default)]
    pub hints: TransportHints,

    #[serde(default)]
    pub auth_realms: Vec<RealmConfig>,

    #[serde(default)]
    pub status_mapping: StatusMapping,
}

impl PackagerConfig {
    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            compression: self.compression,
            checksums: self.checksums.clone(),
            precompute: self.precompute_checksums,
            ..Default::default()
        }
    }

    pub fn realms(&self) -> Vec<AuthRealm> {
        self.auth_realms
            .iter()
            .map(|r| AuthRealm::new(r.base_url.clone(), r.username.clone(), &r.password))
            .collect()
    }
}

impl fmt::Debug for PackagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackagerConfig")
            .field("format", &self.format)
            .field("compression", &self.compression)
            .field("checksums", &self.checksums)
            .field("precompute_checksums", &self.precompute_checksums)
            .field("resolve_status", &self.resolve_status)
            .field("hints", &self.hints)
            .field("auth_realms", &self.auth_realms)
            .field("status_mapping", &self.status_mapping)
            .finish()
    }
}

/// Credentials for status references under `base_url`
#[derive(Clone, Serialize, Deserialize)]
pub struct RealmConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RealmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Log level for diagnostic output
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_pool_size() -> usize {
    4
}

fn default_store_path() -> PathBuf {
    PathBuf::from("store")
}

fn default_checksums() -> Vec<Algorithm> {
    vec![Algorithm::Md5, Algorithm::Sha256]
}

fn invalid(key: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.into(),
        message: message.into(),
    }
}

impl DepositConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DepositConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every packager, naming the first offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, packager) in &self.packagers {
            let key = |field: &str| format!("packagers.{name}.{field}");

            format::by_name(&packager.format)
                .map_err(|e| invalid(key("format"), e.to_string()))?;

            if packager.checksums.is_empty() {
                return Err(invalid(
                    key("checksums"),
                    "at least one checksum algorithm is required",
                ));
            }

            if packager.hints.get(keys::PROTOCOL).is_none() {
                return Err(invalid(
                    key(&format!("hints.\"{}\"", keys::PROTOCOL)),
                    "a transport protocol is required",
                ));
            }

            packager
                .status_mapping
                .validate()
                .map_err(|e| invalid(key("status_mapping"), e.to_string()))?;

            for (i, realm) in packager.auth_realms.iter().enumerate() {
                url::Url::parse(&realm.base_url).map_err(|e| {
                    invalid(key(&format!("auth_realms[{i}].base_url")), e.to_string())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[logging]
level = "warn"

[workers]
pool_size = 2

[store]
path = "/var/lib/pass/store"

[packagers.JScholarship]
format = "dspace-mets"
compression = "gzip"
checksums = ["md5", "sha256"]
resolve_status = true

[packagers.JScholarship.hints]
"deposit.transport.protocol" = "sword2"
"deposit.transport.authmode" = "userpass"
"deposit.transport.username" = "user"
"deposit.transport.password" = "secret"

[[packagers.JScholarship.auth_realms]]
base_url = "https://example.edu/"
username = "user"
password = "secret"

[packagers.JScholarship.status_mapping]
default = "submitted"

[packagers.JScholarship.status_mapping.map]
"http://dspace.org/state/archived" = "accepted"

[packagers.PMC]
format = "nihms-native"
compression = "none"

[packagers.PMC.hints]
"deposit.transport.protocol" = "ftp"
"#;

    #[test]
    fn test_default_config() {
        let config = DepositConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.workers.pool_size, 4);
        assert!(config.packagers.is_empty());
    }

    #[test]
    fn test_parse_example() {
        let config = DepositConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.workers.pool_size, 2);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/pass/store"));

        let jscholarship = &config.packagers["JScholarship"];
        assert_eq!(jscholarship.compression, Compression::Gzip);
        assert!(jscholarship.precompute_checksums);
        assert!(jscholarship.resolve_status);
        assert_eq!(jscholarship.hints.get(keys::PROTOCOL), Some("sword2"));
        assert_eq!(jscholarship.realms()[0].username, "user");
        assert_eq!(
            jscholarship
                .status_mapping
                .map("http://dspace.org/state/archived")
                .unwrap(),
            Some(crate::model::DepositStatus::Accepted)
        );

        let pmc = &config.packagers["PMC"];
        assert_eq!(pmc.compression, Compression::None);
        assert_eq!(pmc.checksums, vec![Algorithm::Md5, Algorithm::Sha256]);
    }

    #[test]
    fn test_validate_names_the_key() {
        let err = DepositConfig::from_toml_str(
            r#"
[packagers.X]
format = "bagit"
[packagers.X.hints]
"deposit.transport.protocol" = "sword2"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("packagers.X.format"));

        let err = DepositConfig::from_toml_str(
            r#"
[packagers.X]
format = "nihms-native"
[packagers.X.status_mapping]
default = "archived"
[packagers.X.hints]
"deposit.transport.protocol" = "ftp"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("packagers.X.status_mapping"));

        let err = DepositConfig::from_toml_str(
            r#"
[packagers.X]
format = "nihms-native"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains(keys::PROTOCOL));
    }

    #[test]
    fn test_verbose_raises_level() {
        let logging = LoggingConfig {
            level: LogLevel::Warn,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(logging.effective_level(), LogLevel::Debug);
    }

    #[test]
    fn test_debug_redacts_realm_password() {
        let config = DepositConfig::from_toml_str(EXAMPLE).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("\"secret\""));
    }
}
