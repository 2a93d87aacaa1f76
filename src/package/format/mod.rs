//! Package formats
//!
//! A format contributes the packaging specification identifier and the
//! generated entries appended after the custodial files. Archive writing is
//! shared by every format and lives in the assembler.

pub mod dspace;
pub mod nihms;

pub use dspace::DspaceMetsFormat;
pub use nihms::NihmsNativeFormat;

use super::error::{PackageError, PackageResult};
use super::Resource;
use crate::model::DepositSubmission;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// Produces the content of one generated archive entry
pub trait StreamingSerializer: Send {
    /// Name of the archive entry
    fn entry_name(&self) -> &str;

    fn serialize(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Format-specific parts of a package
pub trait PackageFormat: Send + Sync {
    /// Configuration name of the format
    fn name(&self) -> &'static str;

    /// Packaging specification identifier announced to the target system
    fn spec(&self) -> &'static str;

    /// Generated entries, in the order they are appended to the archive
    ///
    /// `custodial` holds the custodial resources already written, with their
    /// sizes and checksums.
    fn generated_entries(
        &self,
        submission: &DepositSubmission,
        custodial: &[Resource],
    ) -> Vec<Box<dyn StreamingSerializer>>;
}

/// Look up a built-in format by its configuration name
pub fn by_name(name: &str) -> PackageResult<Arc<dyn PackageFormat>> {
    match name {
        nihms::FORMAT_NAME => Ok(Arc::new(NihmsNativeFormat)),
        dspace::FORMAT_NAME => Ok(Arc::new(DspaceMetsFormat)),
        other => Err(PackageError::UnknownFormat(other.to_string())),
    }
}

/// A serializer over content rendered up front
pub(crate) struct RenderedEntry {
    name: String,
    content: io::Result<Vec<u8>>,
}

impl RenderedEntry {
    pub(crate) fn new(name: impl Into<String>, content: io::Result<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

impl StreamingSerializer for RenderedEntry {
    fn entry_name(&self) -> &str {
        &self.name
    }

    fn serialize(&self) -> io::Result<Box<dyn Read + Send>> {
        match &self.content {
            Ok(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

fn xml_error<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Thin indenting XML writer used by the generated entries
pub(crate) struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub(crate) fn new() -> io::Result<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        Ok(Self { writer })
    }

    pub(crate) fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> io::Result<()> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer
            .write_event(Event::Start(element))
            .map_err(xml_error)
    }

    pub(crate) fn end(&mut self, name: &str) -> io::Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> io::Result<()> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer
            .write_event(Event::Empty(element))
            .map_err(xml_error)
    }

    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> io::Result<()> {
        self.start(name, attributes)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.end(name)
    }

    /// Write `<name>text</name>` only when there is text
    pub(crate) fn optional_element(&mut self, name: &str, text: Option<&str>) -> io::Result<()> {
        match text.filter(|t| !t.is_empty()) {
            Some(text) => self.text_element(name, &[], text),
            None => Ok(()),
        }
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("nihms-native").unwrap().name(), "nihms-native");
        assert_eq!(
            by_name("dspace-mets").unwrap().spec(),
            "http://purl.org/net/sword/package/METSDSpaceSIP"
        );
        assert!(matches!(
            by_name("bagit"),
            Err(PackageError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_xml_writer_escapes_text_and_attributes() {
        let mut xml = XmlWriter::new().unwrap();
        xml.start("root", &[("note", "a<b")]).unwrap();
        xml.text_element("title", &[], "Fish & Chips").unwrap();
        xml.optional_element("missing", None).unwrap();
        xml.end("root").unwrap();
        let rendered = String::from_utf8(xml.into_bytes()).unwrap();

        assert!(rendered.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(rendered.contains("note=\"a&lt;b\""));
        assert!(rendered.contains("<title>Fish &amp; Chips</title>"));
        assert!(!rendered.contains("missing"));
    }
}
