//! Package transports
//!
//! A [`Transport`] opens a [`TransportSession`] from configuration hints; a
//! session delivers packages to one target system until it is closed.
//!
//! Session lifecycle: `OPEN -> send* -> CLOSED`. A closed session refuses to
//! send and closing it again is a no-op. Sends on one session must be
//! serialized by the caller.

pub mod error;
pub mod ftp;
pub mod hints;
pub mod sword;

pub use error::{TransportError, TransportResult};
pub use ftp::{FtpClient, FtpConnector, FtpTransport};
pub use hints::{keys, AuthMode, TransportHints};
pub use sword::{HttpSwordClient, Sword2Transport, SwordClient};

use crate::package::{PackageError, PackageStream};
use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// What the target system handed back for an accepted deposit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositReceipt {
    /// Protocol status code (HTTP status for SWORD)
    pub status: u16,
    /// Location of the created resource, when reported
    pub location: Option<String>,
    /// Edit IRI of the deposited item
    pub edit_iri: Option<String>,
    /// Reference to the status document of the deposit
    pub statement_ref: Option<String>,
}

/// Outcome of one send
///
/// Either delivered or failed with its cause, never both.
#[derive(Debug)]
pub enum TransportResponse {
    Delivered { receipt: Option<DepositReceipt> },
    Failed(TransportError),
}

impl TransportResponse {
    pub fn success(&self) -> bool {
        matches!(self, TransportResponse::Delivered { .. })
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            TransportResponse::Failed(e) => Some(e),
            TransportResponse::Delivered { .. } => None,
        }
    }

    pub fn receipt(&self) -> Option<&DepositReceipt> {
        match self {
            TransportResponse::Delivered { receipt } => receipt.as_ref(),
            TransportResponse::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> TransportResult<Option<DepositReceipt>> {
        match self {
            TransportResponse::Delivered { receipt } => Ok(receipt),
            TransportResponse::Failed(e) => Err(e),
        }
    }
}

impl From<TransportResult<Option<DepositReceipt>>> for TransportResponse {
    fn from(result: TransportResult<Option<DepositReceipt>>) -> Self {
        match result {
            Ok(receipt) => TransportResponse::Delivered { receipt },
            Err(e) => TransportResponse::Failed(e),
        }
    }
}

/// Delivers packages over one wire protocol
pub trait Transport: Send + Sync {
    /// Protocol name, as used in the `deposit.transport.protocol` hint
    fn protocol(&self) -> &'static str;

    /// Validate `hints`, connect and authenticate
    fn open(&self, hints: &TransportHints) -> TransportResult<Box<dyn TransportSession>>;
}

/// An open connection to a target system
pub trait TransportSession: Send {
    /// Deliver `package`; the package stream is always closed afterwards
    fn send(&mut self, package: &dyn PackageStream, hints: &TransportHints) -> TransportResponse;

    /// Release the connection. Closing twice is a no-op.
    fn close(&mut self) -> TransportResult<()>;

    fn closed(&self) -> bool;
}

/// Closes the wrapped session when dropped
pub struct SessionGuard {
    session: Box<dyn TransportSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn TransportSession>) -> Self {
        Self { session }
    }

    pub fn send(&mut self, package: &dyn PackageStream, hints: &TransportHints) -> TransportResponse {
        self.session.send(package, hints)
    }

    pub fn close(&mut self) -> TransportResult<()> {
        self.session.close()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.session.closed() {
            if let Err(e) = self.session.close() {
                warn!("Error closing transport session: {}", e);
            }
        }
    }
}

/// Remembers the first read error of a package stream handed to a wire client
///
/// Wire clients report a failed body read as their own error; the recorded
/// producer failure is the real cause.
#[derive(Clone, Default)]
pub(crate) struct FailureRecorder {
    failure: Arc<Mutex<Option<String>>>,
}

impl FailureRecorder {
    pub(crate) fn wrap(stream: Box<dyn Read + Send>) -> (RecordingReader, FailureRecorder) {
        let recorder = FailureRecorder::default();
        let reader = RecordingReader {
            inner: stream,
            recorder: recorder.clone(),
        };
        (reader, recorder)
    }

    fn record(&self, error: &io::Error) {
        if let Ok(mut failure) = self.failure.lock() {
            failure.get_or_insert_with(|| error.to_string());
        }
    }

    /// Replace the outcome of a send with the producer failure, if any
    pub(crate) fn check<T>(&self, result: TransportResult<T>) -> TransportResult<T> {
        let failure = self.failure.lock().ok().and_then(|mut f| f.take());
        match failure {
            Some(message) => Err(TransportError::Package(PackageError::Producer(message))),
            None => result,
        }
    }
}

pub(crate) struct RecordingReader {
    inner: Box<dyn Read + Send>,
    recorder: FailureRecorder,
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(|e| {
            self.recorder.record(&e);
            e
        })
    }
}
