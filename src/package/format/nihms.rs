//! NIHMS native package format
//!
//! Custodial files followed by `manifest.txt` (one tab separated line per
//! custodial file) and `bulk_meta.xml` (manuscript, journal and contact
//! metadata).

use super::{PackageFormat, RenderedEntry, StreamingSerializer, XmlWriter};
use crate::model::{DepositSubmission, PersonRole};
use crate::package::Resource;
use std::io;

pub const FORMAT_NAME: &str = "nihms-native";
pub const SPEC: &str = "nihms-native-2017-07";
pub const MANIFEST_ENTRY_NAME: &str = "manifest.txt";
pub const METADATA_ENTRY_NAME: &str = "bulk_meta.xml";

pub struct NihmsNativeFormat;

impl PackageFormat for NihmsNativeFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn spec(&self) -> &'static str {
        SPEC
    }

    fn generated_entries(
        &self,
        submission: &DepositSubmission,
        _custodial: &[Resource],
    ) -> Vec<Box<dyn StreamingSerializer>> {
        vec![
            Box::new(RenderedEntry::new(
                MANIFEST_ENTRY_NAME,
                Ok(render_manifest(submission)),
            )),
            Box::new(RenderedEntry::new(
                METADATA_ENTRY_NAME,
                render_bulk_metadata(submission),
            )),
        ]
    }
}

fn clean(field: &str) -> String {
    field.replace(['\t', '\r', '\n'], " ")
}

/// `classification<TAB>name<TAB>description` per custodial file
pub fn render_manifest(submission: &DepositSubmission) -> Vec<u8> {
    let mut manifest = String::new();
    for file in submission.files() {
        manifest.push_str(file.role.as_str());
        manifest.push('\t');
        manifest.push_str(&clean(&file.name));
        manifest.push('\t');
        manifest.push_str(&clean(file.description.as_deref().unwrap_or_default()));
        manifest.push('\n');
    }
    manifest.into_bytes()
}

pub fn render_bulk_metadata(submission: &DepositSubmission) -> io::Result<Vec<u8>> {
    let metadata = submission.metadata();
    let manuscript = &metadata.manuscript;
    let journal = &metadata.journal;
    let article = &metadata.article;

    let mut xml = XmlWriter::new()?;
    xml.start("nihms-submit", &[])?;
    xml.optional_element(
        "title",
        manuscript.title.as_deref().or(article.title.as_deref()),
    )?;

    xml.start("journal-meta", &[])?;
    if let Some(id) = journal.journal_id.as_deref() {
        xml.text_element("journal-id", &[("journal-id-type", "nlm-ta")], id)?;
    }
    if let Some(issn) = journal.issn.as_deref() {
        let pub_type = journal.pub_type.map(|t| t.as_str()).unwrap_or("ppub");
        xml.text_element("issn", &[("pub-type", pub_type)], issn)?;
    }
    xml.optional_element("journal-title", journal.journal_title.as_deref())?;
    xml.end("journal-meta")?;

    let nihms_id = manuscript.nihms_id.as_deref().unwrap_or_default();
    xml.start("manuscript", &[("id", nihms_id)])?;
    xml.optional_element("url", manuscript.manuscript_url.as_deref())?;
    xml.optional_element("doi", article.doi.as_deref())?;
    xml.end("manuscript")?;

    xml.start("contacts", &[])?;
    for person in metadata
        .persons
        .iter()
        .filter(|p| matches!(p.role, PersonRole::Pi | PersonRole::CoPi | PersonRole::Submitter))
    {
        let first = person.first_name.as_deref().unwrap_or_default();
        let middle = person.middle_name.as_deref().unwrap_or_default();
        let last = person.last_name.as_deref().unwrap_or_default();
        let email = person.email.as_deref().unwrap_or_default();
        xml.empty(
            "person",
            &[
                ("fname", first),
                ("mname", middle),
                ("lname", last),
                ("email", email),
                ("person-type", person.role.as_str()),
            ],
        )?;
    }
    xml.end("contacts")?;

    xml.optional_element("abstract", manuscript.msabstract.as_deref())?;
    xml.end("nihms-submit")?;
    Ok(xml.into_bytes())
}
