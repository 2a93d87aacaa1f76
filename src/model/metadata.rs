//! The packaging projection of a submission
//!
//! A [`DepositSubmission`] is built once per processing attempt from the
//! stored records and never mutated afterwards. Manuscript, journal, person
//! and article metadata are carried on the stored submission in the same
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a custodial file relates to the manuscript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    #[default]
    Manuscript,
    Figure,
    Supplemental,
    Table,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Manuscript => "manuscript",
            FileRole::Figure => "figure",
            FileRole::Supplemental => "supplement",
            FileRole::Table => "table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalPublicationType {
    Ppub,
    Epub,
}

impl JournalPublicationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalPublicationType::Ppub => "ppub",
            JournalPublicationType::Epub => "epub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Author,
    Pi,
    CoPi,
    Submitter,
}

impl PersonRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Author => "author",
            PersonRole::Pi => "pi",
            PersonRole::CoPi => "copi",
            PersonRole::Submitter => "submitter",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manuscript {
    pub title: Option<String>,
    pub msabstract: Option<String>,
    pub nihms_id: Option<String>,
    pub manuscript_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Journal {
    pub journal_id: Option<String>,
    pub journal_title: Option<String>,
    pub issn: Option<String>,
    pub pub_type: Option<JournalPublicationType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: PersonRole,
}

impl Person {
    /// Given, middle and family names joined by single spaces
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub title: Option<String>,
    pub doi: Option<String>,
    pub embargo_lift_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositMetadata {
    pub manuscript: Manuscript,
    pub journal: Journal,
    pub persons: Vec<Person>,
    pub article: Article,
}

/// A custodial file with its resolvable location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositFile {
    pub name: String,
    pub location: String,
    pub role: FileRole,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

/// Immutable, fully resolved view of a submission ready for packaging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositSubmission {
    id: String,
    name: String,
    metadata: DepositMetadata,
    files: Vec<DepositFile>,
}

impl DepositSubmission {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        metadata: DepositMetadata,
        files: Vec<DepositFile>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata,
            files,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human readable name, usually the manuscript title
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &DepositMetadata {
        &self.metadata
    }

    /// Custodial files in submission order
    pub fn files(&self) -> &[DepositFile] {
        &self.files
    }
}
