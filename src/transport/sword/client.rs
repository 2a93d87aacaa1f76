//! SWORD v2 HTTP client

use super::xml::{self, ServiceDocument};
use crate::transport::error::{TransportError, TransportResult};
use crate::transport::DepositReceipt;
use once_cell::sync::OnceCell;
use reqwest::blocking::{Body, Client, Response};
use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

pub const HEADER_CONTENT_MD5: &str = "Content-MD5";
pub const HEADER_PACKAGING: &str = "Packaging";
pub const HEADER_IN_PROGRESS: &str = "In-Progress";
pub const HEADER_ON_BEHALF_OF: &str = "On-Behalf-Of";

/// Credentials for one SWORD session
#[derive(Clone)]
pub struct SwordAuth {
    pub username: String,
    pub password: SecretString,
    pub on_behalf_of: Option<String>,
}

impl fmt::Debug for SwordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwordAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("on_behalf_of", &self.on_behalf_of)
            .finish()
    }
}

/// A binary deposit request
pub struct SwordDeposit {
    pub filename: String,
    pub mime_type: Option<String>,
    /// Hex encoded MD5 of the body
    pub md5_hex: Option<String>,
    pub packaging: Option<String>,
    pub content_length: Option<u64>,
    pub in_progress: bool,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for SwordDeposit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwordDeposit")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("md5_hex", &self.md5_hex)
            .field("packaging", &self.packaging)
            .field("content_length", &self.content_length)
            .field("in_progress", &self.in_progress)
            .finish_non_exhaustive()
    }
}

/// Wire operations a SWORD session needs
pub trait SwordClient: Send + Sync {
    fn service_document(&self, url: &str, auth: &SwordAuth) -> TransportResult<ServiceDocument>;

    /// POST a binary package to a collection
    fn deposit(
        &self,
        collection: &str,
        deposit: SwordDeposit,
        auth: &SwordAuth,
    ) -> TransportResult<DepositReceipt>;
}

/// [`SwordClient`] over blocking reqwest
pub struct HttpSwordClient {
    client: OnceCell<Client>,
    timeout: Option<Duration>,
}

impl HttpSwordClient {
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
            timeout: None,
        }
    }

    /// Bound every request, body upload included
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: OnceCell::new(),
            timeout: Some(timeout),
        }
    }

    fn client(&self, endpoint: &str) -> TransportResult<&Client> {
        self.client.get_or_try_init(|| {
            let mut builder = Client::builder().user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ));
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            builder.build().map_err(|e| connection(endpoint, e))
        })
    }

    fn headers(auth: &SwordAuth) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(on_behalf_of) = &auth.on_behalf_of {
            if let Ok(value) = HeaderValue::from_str(on_behalf_of) {
                headers.insert(HEADER_ON_BEHALF_OF, value);
            }
        }
        headers
    }
}

impl Default for HttpSwordClient {
    fn default() -> Self {
        Self::new()
    }
}

fn connection(endpoint: &str, error: reqwest::Error) -> TransportError {
    TransportError::Connection {
        endpoint: endpoint.to_string(),
        source: Box::new(error),
    }
}

fn header_value(name: &str, value: &str, endpoint: &str) -> TransportResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| TransportError::Protocol {
        endpoint: endpoint.to_string(),
        message: format!("value for header '{name}' is not valid: '{value}'"),
    })
}

fn read_body(response: Response, endpoint: &str) -> TransportResult<String> {
    response.text().map_err(|e| connection(endpoint, e))
}

impl SwordClient for HttpSwordClient {
    fn service_document(&self, url: &str, auth: &SwordAuth) -> TransportResult<ServiceDocument> {
        debug!("Retrieving SWORD service document from {}", url);
        let response = self
            .client(url)?
            .get(url)
            .basic_auth(&auth.username, Some(auth.password.expose_secret()))
            .headers(Self::headers(auth))
            .send()
            .map_err(|e| connection(url, e))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(TransportError::Authentication {
                endpoint: url.to_string(),
                status,
            });
        }
        let body = read_body(response, url)?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Protocol {
                endpoint: url.to_string(),
                message: format!("service document request returned HTTP {status}"),
            });
        }

        xml::parse_service_document(&body).map_err(|message| TransportError::Protocol {
            endpoint: url.to_string(),
            message,
        })
    }

    fn deposit(
        &self,
        collection: &str,
        deposit: SwordDeposit,
        auth: &SwordAuth,
    ) -> TransportResult<DepositReceipt> {
        let mut headers = Self::headers(auth);
        headers.insert(
            header::CONTENT_DISPOSITION,
            header_value(
                "Content-Disposition",
                &format!("attachment; filename={}", deposit.filename),
                collection,
            )?,
        );
        if let Some(mime_type) = &deposit.mime_type {
            headers.insert(
                header::CONTENT_TYPE,
                header_value("Content-Type", mime_type, collection)?,
            );
        }
        if let Some(md5) = &deposit.md5_hex {
            headers.insert(HEADER_CONTENT_MD5, header_value(HEADER_CONTENT_MD5, md5, collection)?);
        }
        if let Some(packaging) = &deposit.packaging {
            headers.insert(HEADER_PACKAGING, header_value(HEADER_PACKAGING, packaging, collection)?);
        }
        headers.insert(
            HEADER_IN_PROGRESS,
            HeaderValue::from_static(if deposit.in_progress { "true" } else { "false" }),
        );

        let body = match deposit.content_length {
            Some(length) => Body::sized(deposit.body, length),
            None => Body::new(deposit.body),
        };

        debug!(
            "Depositing '{}' to {} ({} bytes)",
            deposit.filename,
            collection,
            deposit
                .content_length
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        let response = self
            .client(collection)?
            .post(collection)
            .basic_auth(&auth.username, Some(auth.password.expose_secret()))
            .headers(headers)
            .body(body)
            .send()
            .map_err(|e| connection(collection, e))?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = read_body(response, collection)?;

        if !(200..300).contains(&status) {
            return Err(xml::map_rejection(
                status,
                &body,
                deposit.packaging.as_deref().unwrap_or_default(),
                collection,
            ));
        }

        let links = if body.trim().is_empty() {
            xml::ReceiptLinks::default()
        } else {
            xml::parse_receipt(&body).map_err(|message| TransportError::Protocol {
                endpoint: collection.to_string(),
                message,
            })?
        };

        Ok(DepositReceipt {
            status,
            location: location.or_else(|| links.edit_iri.clone()),
            edit_iri: links.edit_iri,
            statement_ref: links.statement,
        })
    }
}
