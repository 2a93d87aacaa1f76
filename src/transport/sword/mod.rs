//! SWORD v2 transport
//!
//! Opening a session authenticates against the service document; each send
//! is a binary deposit of the package into the collection named by the
//! `deposit.transport.sword.target-collection` hint.

pub mod client;
pub mod xml;

pub use client::{HttpSwordClient, SwordAuth, SwordClient, SwordDeposit};
pub use xml::{Collection, ServiceDocument};

use super::error::{TransportError, TransportResult};
use super::hints::{keys, AuthMode, TransportHints};
use super::{FailureRecorder, Transport, TransportResponse, TransportSession};
use crate::package::{Algorithm, PackageStream};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PROTOCOL: &str = "sword2";

const SWORD_SPEC: &str = "SWORD v2 profile section 6.3.3";

pub struct Sword2Transport {
    client: Arc<dyn SwordClient>,
}

impl Sword2Transport {
    pub fn new(client: Arc<dyn SwordClient>) -> Self {
        Self { client }
    }

    /// Transport backed by [`HttpSwordClient`]
    pub fn http() -> Self {
        Self::new(Arc::new(HttpSwordClient::new()))
    }
}

impl Transport for Sword2Transport {
    fn protocol(&self) -> &'static str {
        PROTOCOL
    }

    fn open(&self, hints: &TransportHints) -> TransportResult<Box<dyn TransportSession>> {
        let mode = hints.auth_mode()?;
        if mode != AuthMode::Userpass {
            return Err(TransportError::UnsupportedAuthMode {
                found: mode.to_string(),
            });
        }

        let auth = SwordAuth {
            username: hints.require(keys::USERNAME)?.to_string(),
            password: hints.password()?,
            on_behalf_of: hints.get(keys::SWORD_ON_BEHALF_OF).map(str::to_string),
        };
        let service_doc_url = hints.require(keys::SWORD_SERVICE_DOC_URL)?;

        let service_document = self.client.service_document(service_doc_url, &auth)?;
        info!(
            "Opened SWORD session for '{}' ({} collections offered by {})",
            auth.username,
            service_document.collections.len(),
            service_doc_url
        );

        Ok(Box::new(Sword2Session {
            client: Arc::clone(&self.client),
            service_document,
            auth,
            closed: false,
        }))
    }
}

/// An authenticated SWORD session bound to one service document
pub struct Sword2Session {
    client: Arc<dyn SwordClient>,
    service_document: ServiceDocument,
    auth: SwordAuth,
    closed: bool,
}

impl Sword2Session {
    pub fn service_document(&self) -> &ServiceDocument {
        &self.service_document
    }

    fn deposit(
        &self,
        package: &dyn PackageStream,
        hints: &TransportHints,
    ) -> TransportResult<Option<super::DepositReceipt>> {
        let metadata = package.metadata();
        if metadata.name().is_empty() {
            return Err(TransportError::MissingPackageName);
        }

        let collection = hints.get(keys::SWORD_COLLECTION_URL).ok_or_else(|| {
            TransportError::InvalidCollection {
                collection: String::new(),
                reason: format!("missing required hint '{}'", keys::SWORD_COLLECTION_URL),
            }
        })?;
        if self.service_document.collection(collection).is_none() {
            return Err(TransportError::InvalidCollection {
                collection: collection.to_string(),
                reason: "not offered by the service document".to_string(),
            });
        }

        let mime_type = Some(metadata.mime_type().to_string()).filter(|m| !m.is_empty());
        let md5_hex = metadata
            .checksum_for(Algorithm::Md5)
            .map(|c| c.as_hex().to_string());
        let packaging = Some(metadata.spec().to_string()).filter(|s| !s.is_empty());

        for (header, present) in [
            ("Content-Type", mime_type.is_some()),
            ("Content-MD5", md5_hex.is_some()),
            ("Packaging", packaging.is_some()),
        ] {
            if !present {
                warn!(
                    "SWORD v2 deposit request is missing HTTP request header '{}' recommended as SHOULD by {}",
                    header, SWORD_SPEC
                );
            }
        }

        let (body, failure) = FailureRecorder::wrap(package.open()?);

        let result = self.client.deposit(
            collection,
            SwordDeposit {
                filename: metadata.name().to_string(),
                mime_type,
                md5_hex,
                packaging,
                content_length: metadata.size_bytes(),
                in_progress: false,
                body: Box::new(body),
            },
            &self.auth,
        );

        let receipt = failure.check(result)?;
        debug!(
            "Deposit of '{}' accepted with HTTP {} (statement: {:?})",
            metadata.name(),
            receipt.status,
            receipt.statement_ref
        );
        Ok(Some(receipt))
    }
}

impl TransportSession for Sword2Session {
    fn send(&mut self, package: &dyn PackageStream, hints: &TransportHints) -> TransportResponse {
        if self.closed {
            return TransportResponse::Failed(TransportError::SessionClosed);
        }
        self.deposit(package, hints).into()
    }

    fn close(&mut self) -> TransportResult<()> {
        self.closed = true;
        Ok(())
    }

    fn closed(&self) -> bool {
        self.closed
    }
}
