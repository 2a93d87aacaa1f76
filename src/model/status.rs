//! Status vocabularies for submissions and deposits

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A status token that is not part of the internal vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{token}' is not a valid {vocabulary} status")]
pub struct UnknownStatus {
    pub vocabulary: &'static str,
    pub token: String,
}

/// Status of one deposit into one target repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    /// The package was handed to the target system
    Submitted,
    /// The target system accepted the deposit
    Accepted,
    /// The target system refused the deposit
    Rejected,
    /// The deposit could not be performed
    Failed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Submitted => "submitted",
            DepositStatus::Accepted => "accepted",
            DepositStatus::Rejected => "rejected",
            DepositStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = UnknownStatus;

    /// Tokens are matched case-insensitively, so `ACCEPTED` and `accepted`
    /// name the same status.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Ok(DepositStatus::Submitted),
            "accepted" => Ok(DepositStatus::Accepted),
            "rejected" => Ok(DepositStatus::Rejected),
            "failed" => Ok(DepositStatus::Failed),
            _ => Err(UnknownStatus {
                vocabulary: "deposit",
                token: s.to_string(),
            }),
        }
    }
}

/// Status of a submission across all of its target repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatedDepositStatus {
    #[default]
    NotStarted,
    InProgress,
    Accepted,
    Rejected,
    Failed,
}

impl AggregatedDepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregatedDepositStatus::NotStarted => "not-started",
            AggregatedDepositStatus::InProgress => "in-progress",
            AggregatedDepositStatus::Accepted => "accepted",
            AggregatedDepositStatus::Rejected => "rejected",
            AggregatedDepositStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AggregatedDepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregatedDepositStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "not-started" => Ok(AggregatedDepositStatus::NotStarted),
            "in-progress" => Ok(AggregatedDepositStatus::InProgress),
            "accepted" => Ok(AggregatedDepositStatus::Accepted),
            "rejected" => Ok(AggregatedDepositStatus::Rejected),
            "failed" => Ok(AggregatedDepositStatus::Failed),
            _ => Err(UnknownStatus {
                vocabulary: "aggregated deposit",
                token: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_status_parse_is_case_insensitive() {
        assert_eq!("ACCEPTED".parse(), Ok(DepositStatus::Accepted));
        assert_eq!(" submitted ".parse(), Ok(DepositStatus::Submitted));
        assert!("archived".parse::<DepositStatus>().is_err());
    }

    #[test]
    fn test_aggregated_status_accepts_both_separators() {
        assert_eq!(
            "IN_PROGRESS".parse(),
            Ok(AggregatedDepositStatus::InProgress)
        );
        assert_eq!(
            "not-started".parse(),
            Ok(AggregatedDepositStatus::NotStarted)
        );
    }

    #[test]
    fn test_serde_tokens() {
        let json = serde_json::to_string(&AggregatedDepositStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not-started\"");
        let status: DepositStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(status, DepositStatus::Rejected);
    }
}
