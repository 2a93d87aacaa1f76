//! Remote status URI to deposit status mapping

use super::error::{StatusError, StatusResult};
use crate::model::DepositStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dictionary from remote status URI to deposit status token, with a fallback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMapping {
    /// Token used for remote statuses missing from `map`
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub map: HashMap<String, String>,
}

impl StatusMapping {
    pub fn new(default: Option<&str>) -> Self {
        Self {
            default: default.map(str::to_string),
            map: HashMap::new(),
        }
    }

    pub fn with(mut self, remote: impl Into<String>, token: impl Into<String>) -> Self {
        self.map.insert(remote.into(), token.into());
        self
    }

    /// Token configured for `remote`, falling back to the default
    pub fn token(&self, remote: &str) -> Option<&str> {
        self.map
            .get(remote)
            .or(self.default.as_ref())
            .map(String::as_str)
    }

    /// Map a remote status URI
    ///
    /// `Ok(None)` when neither the dictionary nor a default applies. A token
    /// that is not a deposit status is an error.
    pub fn map(&self, remote: &str) -> StatusResult<Option<DepositStatus>> {
        self.token(remote)
            .map(|token| {
                token
                    .parse::<DepositStatus>()
                    .map_err(|source| StatusError::InvalidMapping {
                        remote: remote.to_string(),
                        source,
                    })
            })
            .transpose()
    }

    /// Check every configured token
    pub fn validate(&self) -> StatusResult<()> {
        if let Some(default) = &self.default {
            default
                .parse::<DepositStatus>()
                .map_err(|source| StatusError::InvalidMapping {
                    remote: "default".to_string(),
                    source,
                })?;
        }
        for remote in self.map.keys() {
            self.map(remote)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_and_default() {
        let mapping = StatusMapping::new(Some("SUBMITTED")).with("urn:x", "ACCEPTED");
        assert_eq!(mapping.map("urn:x").unwrap(), Some(DepositStatus::Accepted));
        assert_eq!(mapping.map("urn:y").unwrap(), Some(DepositStatus::Submitted));
    }

    #[test]
    fn test_no_default() {
        let mapping = StatusMapping::new(None).with("urn:x", "rejected");
        assert_eq!(mapping.map("urn:y").unwrap(), None);
    }

    #[test]
    fn test_invalid_token_is_an_error() {
        let mapping = StatusMapping::new(None).with("urn:x", "archived");
        let err = mapping.map("urn:x").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("archived"));
        assert!(mapping.validate().is_err());
    }
}
