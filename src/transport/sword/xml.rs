//! SWORD v2 / Atom documents
//!
//! Parsing is namespace-agnostic: elements are matched on their local name,
//! which is all the service document, deposit receipt and error document
//! need.

use crate::transport::error::TransportError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::cell::RefCell;

pub const STATEMENT_REL: &str = "http://purl.org/net/sword/terms/statement";
pub const ERROR_CHECKSUM_MISMATCH: &str = "http://purl.org/net/sword/error/ErrorChecksumMismatch";
pub const ERROR_CONTENT: &str = "http://purl.org/net/sword/error/ErrorContent";
pub const ERROR_BAD_REQUEST: &str = "http://purl.org/net/sword/error/ErrorBadRequest";

/// A deposit target advertised by the service document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub href: String,
    pub title: Option<String>,
    pub accept_packaging: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDocument {
    pub collections: Vec<Collection>,
}

impl ServiceDocument {
    /// Find a collection by href, ignoring a trailing slash
    pub fn collection(&self, href: &str) -> Option<&Collection> {
        let wanted = href.trim_end_matches('/');
        self.collections
            .iter()
            .find(|c| c.href.trim_end_matches('/') == wanted)
    }
}

/// Body of a SWORD error response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDocument {
    pub error_uri: Option<String>,
    pub summary: Option<String>,
    pub verbose_description: Option<String>,
}

impl ErrorDocument {
    /// The most specific human readable description available
    pub fn message(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .or(self.verbose_description.as_deref())
    }
}

/// Links found in a deposit receipt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptLinks {
    pub edit_iri: Option<String>,
    pub statement: Option<String>,
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Unescaped value of the attribute with local name `name`
pub(crate) fn attribute(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Walk a document, reporting element starts and text with the enclosing
/// element's local name
fn walk<F, G>(xml: &str, mut on_start: F, mut on_text: G) -> Result<(), String>
where
    F: FnMut(&str, &BytesStart<'_>),
    G: FnMut(&[String], String),
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                on_start(&name, &e);
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                on_start(&name, &e);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?.into_owned();
                on_text(&path, text);
            }
            Ok(Event::CData(c)) => {
                on_text(&path, String::from_utf8_lossy(&c.into_inner()).into_owned());
            }
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {}",
                    reader.error_position(),
                    e
                ))
            }
        }
    }
}

pub fn parse_service_document(xml: &str) -> Result<ServiceDocument, String> {
    let collections: RefCell<Vec<Collection>> = RefCell::new(Vec::new());

    walk(
        xml,
        |name, e| {
            if name == "collection" {
                collections.borrow_mut().push(Collection {
                    href: attribute(e, "href").unwrap_or_default(),
                    title: None,
                    accept_packaging: Vec::new(),
                });
            }
        },
        |path, text| {
            let Some(position) = path.iter().rposition(|p| p == "collection") else {
                return;
            };
            // Only direct children of the collection describe it
            if path.len() != position + 2 {
                return;
            }
            let mut collections = collections.borrow_mut();
            let Some(collection) = collections.last_mut() else {
                return;
            };
            match path[position + 1].as_str() {
                "title" => collection.title = Some(text),
                "acceptPackaging" => collection.accept_packaging.push(text),
                _ => {}
            }
        },
    )?;

    let collections = collections.into_inner();
    if collections.iter().any(|c| c.href.is_empty()) {
        return Err("service document lists a collection without an href".to_string());
    }
    Ok(ServiceDocument { collections })
}

/// Parse a SWORD error document, `None` when the body is not one
pub fn parse_error_document(xml: &str) -> Option<ErrorDocument> {
    let mut document = ErrorDocument::default();
    let mut is_error = false;

    walk(
        xml,
        |name, e| {
            if name == "error" {
                is_error = true;
                document.error_uri = attribute(e, "href");
            }
        },
        |path, text| match path.last().map(String::as_str) {
            Some("summary") => document.summary = Some(text),
            Some("verboseDescription") => document.verbose_description = Some(text),
            _ => {}
        },
    )
    .ok()?;

    is_error.then_some(document)
}

pub fn parse_receipt(xml: &str) -> Result<ReceiptLinks, String> {
    let mut links = ReceiptLinks::default();
    let mut statement_is_atom = false;

    walk(
        xml,
        |name, e| {
            if name != "link" {
                return;
            }
            let rel = attribute(e, "rel").unwrap_or_default();
            let Some(href) = attribute(e, "href") else {
                return;
            };
            if rel == "edit" {
                links.edit_iri = Some(href);
            } else if rel == STATEMENT_REL {
                // Prefer the Atom serialization of the statement
                let atom = attribute(e, "type")
                    .map(|t| t.contains("atom"))
                    .unwrap_or(false);
                if links.statement.is_none() || (atom && !statement_is_atom) {
                    links.statement = Some(href);
                    statement_is_atom = atom;
                }
            }
        },
        |_, _| {},
    )?;

    Ok(links)
}

/// Map a non-2xx deposit response to a named transport error
pub fn map_rejection(status: u16, body: &str, packaging: &str, collection: &str) -> TransportError {
    let document = parse_error_document(body);
    let message = document
        .as_ref()
        .and_then(|d| d.message())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.chars().take(512).collect()
            }
        });
    let error_uri = document.and_then(|d| d.error_uri);

    match error_uri.as_deref() {
        Some(ERROR_CHECKSUM_MISMATCH) => TransportError::ChecksumMismatch {
            endpoint: collection.to_string(),
            message,
        },
        Some(ERROR_CONTENT) => TransportError::UnsupportedPackaging {
            packaging: packaging.to_string(),
            message,
        },
        _ if status == 404 => TransportError::InvalidCollection {
            collection: collection.to_string(),
            reason: message,
        },
        _ if status == 401 || status == 403 => TransportError::Authentication {
            endpoint: collection.to_string(),
            status,
        },
        _ if status == 412 => TransportError::ChecksumMismatch {
            endpoint: collection.to_string(),
            message,
        },
        _ if status == 415 => TransportError::UnsupportedPackaging {
            packaging: packaging.to_string(),
            message,
        },
        _ => TransportError::Rejected {
            status,
            error_uri,
            message,
        },
    }
}
