//! Transport configuration hints
//!
//! Hints are flat string key/value pairs taken from the packager
//! configuration. Each transport documents the keys it reads.

use super::error::{TransportError, TransportResult};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Well-known hint keys
pub mod keys {
    pub const PROTOCOL: &str = "deposit.transport.protocol";
    pub const AUTHMODE: &str = "deposit.transport.authmode";
    pub const USERNAME: &str = "deposit.transport.username";
    pub const PASSWORD: &str = "deposit.transport.password";
    pub const SERVER_ID: &str = "deposit.transport.serverid";
    pub const SERVER_FQDN: &str = "deposit.transport.server-fqdn";
    pub const SERVER_PORT: &str = "deposit.transport.server-port";

    pub const FTP_BASE_DIRECTORY: &str = "deposit.transport.ftp.basedir";
    pub const FTP_USE_PASV: &str = "deposit.transport.ftp.use-pasv";
    pub const FTP_DATA_TYPE: &str = "deposit.transport.ftp.data-type";

    pub const SWORD_SERVICE_DOC_URL: &str = "deposit.transport.sword.service-doc";
    pub const SWORD_COLLECTION_URL: &str = "deposit.transport.sword.target-collection";
    pub const SWORD_ON_BEHALF_OF: &str = "deposit.transport.sword.on-behalf-of";
}

/// How a transport authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Username and password hints
    Userpass,
    /// Credentials implied by the environment
    Implicit,
    /// Credentials referenced from elsewhere
    Reference,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMode::Userpass => "userpass",
            AuthMode::Implicit => "implicit",
            AuthMode::Reference => "reference",
        })
    }
}

impl FromStr for AuthMode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "userpass" => Ok(AuthMode::Userpass),
            "implicit" => Ok(AuthMode::Implicit),
            "reference" => Ok(AuthMode::Reference),
            _ => Err(TransportError::InvalidHint {
                key: keys::AUTHMODE.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportHints(BTreeMap<String, String>);

impl TransportHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Value of a required hint, naming the key when it is absent
    pub fn require(&self, key: &str) -> TransportResult<&str> {
        self.get(key).ok_or_else(|| TransportError::MissingHint {
            key: key.to_string(),
        })
    }

    /// Parse an optional hint
    pub fn parse<T: FromStr>(&self, key: &str) -> TransportResult<Option<T>> {
        self.get(key)
            .map(|value| {
                value.parse().map_err(|_| TransportError::InvalidHint {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn auth_mode(&self) -> TransportResult<AuthMode> {
        self.require(keys::AUTHMODE)?.parse()
    }

    pub fn password(&self) -> TransportResult<SecretString> {
        Ok(SecretString::new(
            self.require(keys::PASSWORD)?.to_string().into_boxed_str(),
        ))
    }

    /// These hints overlaid with `overrides`
    pub fn merged(&self, overrides: &TransportHints) -> TransportHints {
        let mut merged = self.clone();
        for (key, value) in &overrides.0 {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TransportHints {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Debug for TransportHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if key.contains("password") {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
