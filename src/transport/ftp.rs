//! FTP transport
//!
//! Stores the package under its name in a date-partitioned base directory.
//! Wire mechanics sit behind [`FtpClient`]; the `ftp-native` feature provides
//! a `suppaftp` implementation.

use super::error::{TransportError, TransportResult};
use super::hints::{keys, AuthMode, TransportHints};
use super::{DepositReceipt, FailureRecorder, Transport, TransportResponse, TransportSession};
use crate::package::PackageStream;
use chrono::Utc;
use secrecy::ExposeSecret;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PROTOCOL: &str = "ftp";
pub const DEFAULT_PORT: u16 = 21;

/// Reply code for a completed transfer
const TRANSFER_COMPLETE: u16 = 226;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Binary,
    Ascii,
}

impl std::str::FromStr for DataType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binary" | "image" | "i" => Ok(DataType::Binary),
            "ascii" | "a" => Ok(DataType::Ascii),
            _ => Err(()),
        }
    }
}

/// One control connection to an FTP server
pub trait FtpClient: Send {
    fn login(&mut self, username: &str, password: &str) -> TransportResult<()>;
    fn data_type(&mut self, data_type: DataType) -> TransportResult<()>;
    fn passive(&mut self, passive: bool) -> TransportResult<()>;
    fn cwd(&mut self, path: &str) -> TransportResult<()>;
    fn mkdir(&mut self, path: &str) -> TransportResult<()>;
    fn store(&mut self, name: &str, reader: &mut dyn Read) -> TransportResult<u64>;
    fn quit(&mut self) -> TransportResult<()>;
}

pub trait FtpConnector: Send + Sync {
    fn connect(&self, host: &str, port: u16) -> TransportResult<Box<dyn FtpClient>>;
}

/// Base directory used when none is configured: `/logs/upload/<UTC date>`
pub fn default_base_directory() -> String {
    format!("/logs/upload/{}", Utc::now().format("%Y-%m-%d"))
}

pub struct FtpTransport {
    connector: Arc<dyn FtpConnector>,
}

impl FtpTransport {
    pub fn new(connector: Arc<dyn FtpConnector>) -> Self {
        Self { connector }
    }

    /// Transport over the bundled client, when compiled in
    pub fn native() -> Self {
        #[cfg(feature = "ftp-native")]
        let connector: Arc<dyn FtpConnector> = Arc::new(native::SuppaFtpConnector);
        #[cfg(not(feature = "ftp-native"))]
        let connector: Arc<dyn FtpConnector> = Arc::new(DisabledConnector);
        Self::new(connector)
    }
}

impl Transport for FtpTransport {
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
        let host = hints.require(keys::SERVER_FQDN)?;
        let port = hints.parse::<u16>(keys::SERVER_PORT)?.unwrap_or(DEFAULT_PORT);
        let username = hints.require(keys::USERNAME)?;
        let password = hints.password()?;
        let data_type = hints
            .parse::<DataType>(keys::FTP_DATA_TYPE)?
            .unwrap_or(DataType::Binary);
        let passive = hints.parse::<bool>(keys::FTP_USE_PASV)?.unwrap_or(true);
        let base_directory = hints
            .get(keys::FTP_BASE_DIRECTORY)
            .map(str::to_string)
            .unwrap_or_else(default_base_directory);

        let mut client = self.connector.connect(host, port)?;
        client.login(username, password.expose_secret())?;
        client.data_type(data_type)?;
        client.passive(passive)?;
        make_directories(client.as_mut(), &base_directory)?;

        info!(
            "Opened FTP session to {}:{} as '{}' in {}",
            host, port, username, base_directory
        );
        Ok(Box::new(FtpSession {
            client,
            base_directory,
            closed: false,
        }))
    }
}

/// Change into `path`, creating each missing component
fn make_directories(client: &mut dyn FtpClient, path: &str) -> TransportResult<()> {
    if path.starts_with('/') {
        client.cwd("/")?;
    }
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if client.cwd(component).is_err() {
            debug!("Creating FTP directory '{}'", component);
            client.mkdir(component)?;
            client.cwd(component)?;
        }
    }
    Ok(())
}

pub struct FtpSession {
    client: Box<dyn FtpClient>,
    base_directory: String,
    closed: bool,
}

impl FtpSession {
    fn store(&mut self, package: &dyn PackageStream) -> TransportResult<Option<DepositReceipt>> {
        let metadata = package.metadata();
        if metadata.name().is_empty() {
            return Err(TransportError::MissingPackageName);
        }

        let (mut body, failure) = FailureRecorder::wrap(package.open()?);
        let result = self.client.store(metadata.name(), &mut body);
        let written = failure.check(result)?;
        if let Some(expected) = metadata.size_bytes() {
            if expected != written {
                warn!(
                    "FTP upload of '{}' wrote {} bytes, package declared {}",
                    metadata.name(),
                    written,
                    expected
                );
            }
        }

        Ok(Some(DepositReceipt {
            status: TRANSFER_COMPLETE,
            location: Some(format!(
                "{}/{}",
                self.base_directory.trim_end_matches('/'),
                metadata.name()
            )),
            ..Default::default()
        }))
    }
}

impl TransportSession for FtpSession {
    fn send(&mut self, package: &dyn PackageStream, _hints: &TransportHints) -> TransportResponse {
        if self.closed {
            return TransportResponse::Failed(TransportError::SessionClosed);
        }
        self.store(package).into()
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client.quit()
    }

    fn closed(&self) -> bool {
        self.closed
    }
}

#[cfg(not(feature = "ftp-native"))]
struct DisabledConnector;

#[cfg(not(feature = "ftp-native"))]
impl FtpConnector for DisabledConnector {
    fn connect(&self, _host: &str, _port: u16) -> TransportResult<Box<dyn FtpClient>> {
        Err(TransportError::UnsupportedProtocol(
            "ftp (built without the ftp-native feature)".to_string(),
        ))
    }
}

#[cfg(feature = "ftp-native")]
mod native {
    use super::{DataType, FtpClient, FtpConnector};
    use crate::transport::error::{TransportError, TransportResult};
    use std::io::Read;
    use suppaftp::types::{FileType, FormatControl};
    use suppaftp::{FtpStream, Mode};

    fn ftp_error(e: suppaftp::FtpError) -> TransportError {
        TransportError::Ftp(e.to_string())
    }

    pub struct SuppaFtpConnector;

    impl FtpConnector for SuppaFtpConnector {
        fn connect(&self, host: &str, port: u16) -> TransportResult<Box<dyn FtpClient>> {
            let stream = FtpStream::connect((host, port)).map_err(|e| TransportError::Connection {
                endpoint: format!("ftp://{host}:{port}"),
                source: Box::new(e),
            })?;
            Ok(Box::new(SuppaFtpClient { stream }))
        }
    }

    struct SuppaFtpClient {
        stream: FtpStream,
    }

    impl FtpClient for SuppaFtpClient {
        fn login(&mut self, username: &str, password: &str) -> TransportResult<()> {
            self.stream.login(username, password).map_err(ftp_error)
        }

        fn data_type(&mut self, data_type: DataType) -> TransportResult<()> {
            let file_type = match data_type {
                DataType::Binary => FileType::Binary,
                DataType::Ascii => FileType::Ascii(FormatControl::Default),
            };
            self.stream.transfer_type(file_type).map_err(ftp_error)
        }

        fn passive(&mut self, passive: bool) -> TransportResult<()> {
            self.stream
                .set_mode(if passive { Mode::Passive } else { Mode::Active });
            Ok(())
        }

        fn cwd(&mut self, path: &str) -> TransportResult<()> {
            self.stream.cwd(path).map_err(ftp_error)
        }

        fn mkdir(&mut self, path: &str) -> TransportResult<()> {
            self.stream.mkdir(path).map_err(ftp_error)
        }

        fn store(&mut self, name: &str, mut reader: &mut dyn Read) -> TransportResult<u64> {
            self.stream.put_file(name, &mut reader).map_err(ftp_error)
        }

        fn quit(&mut self) -> TransportResult<()> {
            self.stream.quit().map_err(ftp_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Metadata, PackageResult, Resource};
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Server {
        directories: Mutex<HashSet<String>>,
        log: Mutex<Vec<String>>,
        files: Mutex<Vec<(String, Vec<u8>)>>,
    }

    struct FakeClient {
        server: Arc<Server>,
        cwd: String,
    }

    impl FakeClient {
        fn log(&self, entry: String) {
            self.server.log.lock().unwrap().push(entry);
        }
    }

    impl FtpClient for FakeClient {
        fn login(&mut self, username: &str, _: &str) -> TransportResult<()> {
            self.log(format!("USER {username}"));
            Ok(())
        }

        fn data_type(&mut self, data_type: DataType) -> TransportResult<()> {
            self.log(format!("TYPE {data_type:?}"));
            Ok(())
        }

        fn passive(&mut self, passive: bool) -> TransportResult<()> {
            self.log(format!("PASV {passive}"));
            Ok(())
        }

        fn cwd(&mut self, path: &str) -> TransportResult<()> {
            let target = if path == "/" {
                String::new()
            } else {
                format!("{}/{}", self.cwd, path)
            };
            if target.is_empty() || self.server.directories.lock().unwrap().contains(&target) {
                self.cwd = target;
                Ok(())
            } else {
                Err(TransportError::Ftp(format!("550 {path}: no such directory")))
            }
        }

        fn mkdir(&mut self, path: &str) -> TransportResult<()> {
            let target = format!("{}/{}", self.cwd, path);
            self.log(format!("MKD {target}"));
            self.server.directories.lock().unwrap().insert(target);
            Ok(())
        }

        fn store(&mut self, name: &str, reader: &mut dyn Read) -> TransportResult<u64> {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            let len = bytes.len() as u64;
            self.server
                .files
                .lock()
                .unwrap()
                .push((format!("{}/{}", self.cwd, name), bytes));
            Ok(len)
        }

        fn quit(&mut self) -> TransportResult<()> {
            self.log("QUIT".to_string());
            Ok(())
        }
    }

    struct FakeConnector(Arc<Server>);

    impl FtpConnector for FakeConnector {
        fn connect(&self, _: &str, port: u16) -> TransportResult<Box<dyn FtpClient>> {
            self.0.log.lock().unwrap().push(format!("CONNECT {port}"));
            Ok(Box::new(FakeClient {
                server: Arc::clone(&self.0),
                cwd: String::new(),
            }))
        }
    }

    struct BytesPackage(Vec<u8>);

    impl PackageStream for BytesPackage {
        fn metadata(&self) -> Metadata {
            Metadata::builder()
                .name("Article.tar.gz")
                .size_bytes(self.0.len() as u64)
                .build()
        }

        fn open(&self) -> PackageResult<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(self.0.clone())))
        }

        fn resources(&self) -> Vec<Resource> {
            Vec::new()
        }
    }

    fn hints() -> TransportHints {
        TransportHints::new()
            .with(keys::AUTHMODE, "userpass")
            .with(keys::USERNAME, "nihms")
            .with(keys::PASSWORD, "secret")
            .with(keys::SERVER_FQDN, "ftp.example.org")
            .with(keys::FTP_BASE_DIRECTORY, "/logs/upload/2017-07-24")
    }

    #[test]
    fn test_open_creates_base_directory_and_stores() {
        let server = Arc::new(Server::default());
        let transport = FtpTransport::new(Arc::new(FakeConnector(Arc::clone(&server))));

        let mut session = transport.open(&hints()).unwrap();
        let response = session.send(&BytesPackage(b"tarball".to_vec()), &hints());
        assert!(response.success());
        assert_eq!(
            response.receipt().and_then(|r| r.location.as_deref()),
            Some("/logs/upload/2017-07-24/Article.tar.gz")
        );
        session.close().unwrap();
        session.close().unwrap();

        let files = server.files.lock().unwrap();
        assert_eq!(files[0].0, "/logs/upload/2017-07-24/Article.tar.gz");
        assert_eq!(files[0].1, b"tarball");

        let log = server.log.lock().unwrap();
        assert_eq!(log[0], "CONNECT 21");
        assert!(log.contains(&"TYPE Binary".to_string()));
        assert!(log.contains(&"PASV true".to_string()));
        assert!(log.contains(&"MKD /logs/upload/2017-07-24".to_string()));
        assert_eq!(log.iter().filter(|l| *l == "QUIT").count(), 1);
    }

    #[test]
    fn test_open_requires_server() {
        let transport = FtpTransport::new(Arc::new(FakeConnector(Arc::default())));
        let err = transport
            .open(&hints().with(keys::SERVER_FQDN, ""))
            .err()
            .unwrap();
        assert!(err.to_string().contains(keys::SERVER_FQDN));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let transport = FtpTransport::new(Arc::new(FakeConnector(Arc::default())));
        let err = transport
            .open(&hints().with(keys::SERVER_PORT, "twenty-one"))
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::InvalidHint { .. }));
    }

    #[test]
    fn test_default_base_directory_is_dated() {
        let dir = default_base_directory();
        assert!(dir.starts_with("/logs/upload/"));
        assert_eq!(dir.len(), "/logs/upload/".len() + 10);
    }

    #[test]
    fn test_closed_session_refuses_send() {
        let transport = FtpTransport::new(Arc::new(FakeConnector(Arc::default())));
        let mut session = transport.open(&hints()).unwrap();
        session.close().unwrap();
        let response = session.send(&BytesPackage(Vec::new()), &hints());
        assert!(matches!(response.error(), Some(TransportError::SessionClosed)));
    }
}
