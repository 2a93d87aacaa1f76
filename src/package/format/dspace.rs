//! DSpace METS SIP package format
//!
//! Custodial files followed by a single `mets.xml` that describes the item
//! with DIM descriptive metadata and lists every custodial file with its
//! size, mime type and checksum.

use super::{PackageFormat, RenderedEntry, StreamingSerializer, XmlWriter};
use crate::model::{DepositSubmission, PersonRole};
use crate::package::{Algorithm, Resource};
use std::io;

pub const FORMAT_NAME: &str = "dspace-mets";
pub const SPEC: &str = "http://purl.org/net/sword/package/METSDSpaceSIP";
pub const METS_ENTRY_NAME: &str = "mets.xml";

const NS_METS: &str = "http://www.loc.gov/METS/";
const NS_XLINK: &str = "http://www.w3.org/1999/xlink";
const NS_DIM: &str = "http://www.dspace.org/xmlns/dspace/dim";
const METS_ID: &str = "DSPACE-METS-SWORD";
const METS_OBJ_ID: &str = "DSPACE-METS-SWORD-OBJ";
const METS_DSPACE_LABEL: &str = "DSpace SWORD Item";
const METS_DSPACE_PROFILE: &str = "DSpace METS SIP Profile 1.0";
const CONTENT_USE: &str = "CONTENT";
const LOCTYPE_URL: &str = "URL";
const DMD_ID: &str = "dmd-1";

pub struct DspaceMetsFormat;

impl PackageFormat for DspaceMetsFormat {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn spec(&self) -> &'static str {
        SPEC
    }

    fn generated_entries(
        &self,
        submission: &DepositSubmission,
        custodial: &[Resource],
    ) -> Vec<Box<dyn StreamingSerializer>> {
        vec![Box::new(RenderedEntry::new(
            METS_ENTRY_NAME,
            render_mets(submission, custodial),
        ))]
    }
}

fn dim_field(
    xml: &mut XmlWriter,
    element: &str,
    qualifier: Option<&str>,
    value: Option<&str>,
) -> io::Result<()> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let mut attributes = vec![("mdschema", "dc"), ("element", element)];
    if let Some(qualifier) = qualifier {
        attributes.push(("qualifier", qualifier));
    }
    xml.text_element("dim:field", &attributes, value)
}

fn render_dim(xml: &mut XmlWriter, submission: &DepositSubmission) -> io::Result<()> {
    let metadata = submission.metadata();
    let title = metadata
        .manuscript
        .title
        .as_deref()
        .or(metadata.article.title.as_deref())
        .or(Some(submission.name()));

    xml.start("dim:dim", &[("xmlns:dim", NS_DIM)])?;
    dim_field(xml, "title", None, title)?;
    dim_field(
        xml,
        "description",
        Some("abstract"),
        metadata.manuscript.msabstract.as_deref(),
    )?;
    for person in metadata
        .persons
        .iter()
        .filter(|p| p.role == PersonRole::Author)
    {
        let name = match (&person.last_name, &person.first_name) {
            (Some(last), Some(first)) => format!("{last}, {first}"),
            _ => person.full_name(),
        };
        dim_field(xml, "contributor", Some("author"), Some(&name))?;
    }
    dim_field(xml, "identifier", Some("doi"), metadata.article.doi.as_deref())?;
    dim_field(
        xml,
        "identifier",
        Some("issn"),
        metadata.journal.issn.as_deref(),
    )?;
    dim_field(
        xml,
        "relation",
        Some("ispartof"),
        metadata.journal.journal_title.as_deref(),
    )?;
    let embargo = metadata
        .article
        .embargo_lift_date
        .map(|d| d.format("%Y-%m-%d").to_string());
    dim_field(xml, "date", Some("available"), embargo.as_deref())?;
    xml.end("dim:dim")
}

pub fn render_mets(submission: &DepositSubmission, custodial: &[Resource]) -> io::Result<Vec<u8>> {
    let mut xml = XmlWriter::new()?;
    xml.start(
        "mets",
        &[
            ("xmlns", NS_METS),
            ("xmlns:xlink", NS_XLINK),
            ("ID", METS_ID),
            ("OBJID", METS_OBJ_ID),
            ("LABEL", METS_DSPACE_LABEL),
            ("PROFILE", METS_DSPACE_PROFILE),
        ],
    )?;

    xml.start("dmdSec", &[("ID", DMD_ID)])?;
    xml.start(
        "mdWrap",
        &[
            ("LABEL", "DIM Metadata"),
            ("MDTYPE", "OTHER"),
            ("OTHERMDTYPE", "DIM"),
            ("MIMETYPE", "text/xml"),
        ],
    )?;
    xml.start("xmlData", &[])?;
    render_dim(&mut xml, submission)?;
    xml.end("xmlData")?;
    xml.end("mdWrap")?;
    xml.end("dmdSec")?;

    xml.start("fileSec", &[])?;
    xml.start("fileGrp", &[("ID", "fg-1"), ("USE", CONTENT_USE)])?;
    for (index, resource) in custodial.iter().enumerate() {
        let file_id = format!("file-{}", index + 1);
        let size = resource.size_bytes().to_string();
        let mut attributes = vec![
            ("ID", file_id.as_str()),
            ("MIMETYPE", resource.mime_type()),
            ("SIZE", size.as_str()),
        ];
        // DSpace verifies MD5 when present, so prefer it over the primary checksum
        let checksum = resource
            .checksum_for(Algorithm::Md5)
            .or_else(|| resource.checksum());
        if let Some(checksum) = checksum {
            attributes.push(("CHECKSUM", checksum.as_hex()));
            attributes.push(("CHECKSUMTYPE", checksum.algorithm().mets_name()));
        }
        xml.start("file", &attributes)?;
        xml.empty(
            "FLocat",
            &[("LOCTYPE", LOCTYPE_URL), ("xlink:href", resource.name())],
        )?;
        xml.end("file")?;
    }
    xml.end("fileGrp")?;
    xml.end("fileSec")?;

    xml.start(
        "structMap",
        &[("ID", "struct-1"), ("LABEL", "DSpace Object"), ("TYPE", "LOGICAL")],
    )?;
    xml.start(
        "div",
        &[
            ("ID", "div-1"),
            ("DMDID", DMD_ID),
            ("TYPE", "DSpace Object Contents"),
        ],
    )?;
    for index in 0..custodial.len() {
        let div_id = format!("div-{}", index + 2);
        let file_id = format!("file-{}", index + 1);
        xml.start("div", &[("ID", div_id.as_str()), ("TYPE", "DSpace BITSTREAM")])?;
        xml.empty("fptr", &[("FILEID", file_id.as_str())])?;
        xml.end("div")?;
    }
    xml.end("div")?;
    xml.end("structMap")?;

    xml.end("mets")?;
    Ok(xml.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DepositMetadata, Manuscript, Person};
    use crate::package::Checksum;

    #[test]
    fn test_file_section_lists_custodial_resources() {
        let metadata = DepositMetadata {
            manuscript: Manuscript {
                title: Some("A Study".to_string()),
                ..Default::default()
            },
            persons: vec![Person {
                first_name: Some("Ada".to_string()),
                middle_name: None,
                last_name: Some("Lovelace".to_string()),
                email: None,
                role: PersonRole::Author,
            }],
            ..Default::default()
        };
        let submission = DepositSubmission::new("s1", "A Study", metadata, vec![]);
        let resource = Resource::builder("paper.pdf")
            .size_bytes(42)
            .checksums(vec![
                Checksum::new(Algorithm::Sha256, vec![0xab; 32]),
                Checksum::new(Algorithm::Md5, vec![0x01; 16]),
            ])
            .build();

        let mets = String::from_utf8(render_mets(&submission, &[resource]).unwrap()).unwrap();

        assert!(mets.contains("PROFILE=\"DSpace METS SIP Profile 1.0\""));
        assert!(mets.contains("<fileGrp ID=\"fg-1\" USE=\"CONTENT\">"));
        assert!(mets.contains("MIMETYPE=\"application/pdf\""));
        assert!(mets.contains("SIZE=\"42\""));
        assert!(mets.contains("CHECKSUM=\"01010101010101010101010101010101\""));
        assert!(mets.contains("CHECKSUMTYPE=\"MD5\""));
        assert!(mets.contains("xlink:href=\"paper.pdf\""));
        assert!(mets.contains("<fptr FILEID=\"file-1\"/>"));
        assert!(mets.contains(">Lovelace, Ada</dim:field>"));
        assert!(mets.contains(">A Study</dim:field>"));
    }
}
