/*!
 * Integration tests for the SWORD v2 transport over HTTP
 *
 * A tiny HTTP responder on a local `TcpListener` plays the SWORD server: it
 * serves a service document, recomputes the MD5 of every deposited body and
 * answers with a receipt or a SWORD error document.
 */

use pass_deposit::package::format::DspaceMetsFormat;
use pass_deposit::package::{
    Algorithm, Assembler, AssemblyOptions, Cataloger, Checksum, Metadata, PackageResult,
    PackageStream, Resource,
};
use pass_deposit::model::{DepositFile, DepositMetadata, DepositSubmission, FileRole};
use pass_deposit::transport::{
    keys, Sword2Transport, Transport, TransportError, TransportHints, TransportResponse,
};
use sha2::Digest;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

const METS_PACKAGING: &str = "http://purl.org/net/sword/package/METSDSpaceSIP";

/// One request as seen by the responder
#[derive(Debug, Clone)]
struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

struct SwordServer {
    base: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl SwordServer {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let server_base = base.clone();
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                handle(stream, &server_base, &seen);
            }
        });

        Self { base, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn hints(&self, collection: &str) -> TransportHints {
        TransportHints::new()
            .with(keys::PROTOCOL, "sword2")
            .with(keys::AUTHMODE, "userpass")
            .with(keys::USERNAME, "depositor")
            .with(keys::PASSWORD, "secret")
            .with(keys::SWORD_SERVICE_DOC_URL, self.url("/servicedocument"))
            .with(keys::SWORD_COLLECTION_URL, self.url(collection))
    }

    fn deposits(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == "POST")
            .cloned()
            .collect()
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let mut body = Vec::new();
    if let Some(length) = headers.get("content-length") {
        let length: usize = length.parse().ok()?;
        body.resize(length, 0);
        reader.read_exact(&mut body).ok()?;
    } else if headers
        .get("transfer-encoding")
        .is_some_and(|te| te.eq_ignore_ascii_case("chunked"))
    {
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).ok()?;
            let size = usize::from_str_radix(size.trim().split(';').next()?, 16).ok()?;
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    Some(Request {
        method,
        path,
        headers,
        body,
    })
}

fn respond(mut stream: &TcpStream, status: &str, headers: &[(&str, String)], body: &str) {
    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(body);
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn error_document(error_uri: &str, summary: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<sword:error xmlns="http://www.w3.org/2005/Atom" xmlns:sword="http://purl.org/net/sword/terms/" href="{error_uri}">
  <title>ERROR</title>
  <summary>{summary}</summary>
</sword:error>"#
    )
}

fn handle(stream: TcpStream, base: &str, seen: &Mutex<Vec<Request>>) {
    let Some(request) = read_request(&stream) else {
        return;
    };
    seen.lock().unwrap().push(request.clone());

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/servicedocument") => {
            let body = format!(
                r#"<?xml version="1.0"?>
<service xmlns="http://www.w3.org/2007/app" xmlns:atom="http://www.w3.org/2005/Atom"
         xmlns:sword="http://purl.org/net/sword/terms/">
  <workspace>
    <atom:title>Repository</atom:title>
    <collection href="{base}/collection/articles">
      <atom:title>Articles</atom:title>
      <sword:acceptPackaging>{METS_PACKAGING}</sword:acceptPackaging>
    </collection>
    <collection href="{base}/collection/retired">
      <atom:title>Retired</atom:title>
    </collection>
  </workspace>
</service>"#
            );
            respond(&stream, "200 OK", &[("Content-Type", "application/atomsvc+xml".to_string())], &body);
        }
        ("POST", "/collection/articles") => {
            let md5 = hex::encode(md5::Md5::digest(&request.body));
            let packaging = request.headers.get("packaging").cloned().unwrap_or_default();
            if request.headers.get("content-md5") != Some(&md5) {
                respond(
                    &stream,
                    "412 Precondition Failed",
                    &[],
                    &error_document(
                        "http://purl.org/net/sword/error/ErrorChecksumMismatch",
                        "The checksum of the received content does not match Content-MD5",
                    ),
                );
            } else if packaging != METS_PACKAGING {
                respond(
                    &stream,
                    "415 Unsupported Media Type",
                    &[],
                    &error_document(
                        "http://purl.org/net/sword/error/ErrorContent",
                        "Unsupported packaging format",
                    ),
                );
            } else {
                let receipt = format!(
                    r#"<?xml version="1.0"?>
<entry xmlns="http://www.w3.org/2005/Atom">
  <link rel="edit" href="{base}/edit/1"/>
  <link rel="http://purl.org/net/sword/terms/statement" type="application/atom+xml;type=feed" href="{base}/statement/1"/>
</entry>"#
                );
                respond(
                    &stream,
                    "201 Created",
                    &[("Location", format!("{base}/edit/1"))],
                    &receipt,
                );
            }
        }
        ("POST", "/collection/retired") => {
            respond(&stream, "404 Not Found", &[], "collection no longer exists");
        }
        _ => respond(&stream, "400 Bad Request", &[], ""),
    }
}

/// A package with fixed bytes and caller-supplied metadata
struct FixedPackage {
    metadata: Metadata,
    bytes: Vec<u8>,
}

impl FixedPackage {
    fn new(bytes: &[u8], spec: &str, md5: Vec<u8>) -> Self {
        Self {
            metadata: Metadata::builder()
                .name("package.tar.gz")
                .spec(spec)
                .size_bytes(bytes.len() as u64)
                .checksum(Checksum::new(Algorithm::Md5, md5))
                .build(),
            bytes: bytes.to_vec(),
        }
    }
}

impl PackageStream for FixedPackage {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn open(&self) -> PackageResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }

    fn resources(&self) -> Vec<Resource> {
        Vec::new()
    }
}

fn send(server: &SwordServer, collection: &str, package: &dyn PackageStream) -> TransportResponse {
    let hints = server.hints(collection);
    let mut session = Sword2Transport::http().open(&hints).unwrap();
    let response = session.send(package, &hints);
    session.close().unwrap();
    response
}

#[test]
fn test_assembled_package_is_accepted() {
    let server = SwordServer::start();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("article.pdf");
    std::fs::write(&path, b"%PDF-1.4 article").unwrap();

    let submission = Arc::new(DepositSubmission::new(
        "sub-1",
        "Article",
        DepositMetadata::default(),
        vec![DepositFile {
            name: "article.pdf".to_string(),
            location: format!("file:{}", path.display()),
            role: FileRole::Manuscript,
            description: None,
            mime_type: None,
        }],
    ));
    let assembler = Assembler::new(
        Arc::new(DspaceMetsFormat),
        Arc::new(Cataloger::default()),
        AssemblyOptions {
            precompute: true,
            ..Default::default()
        },
    );
    let package = assembler.assemble(submission).unwrap();

    let response = send(&server, "/collection/articles", &package);

    let receipt = response.into_result().unwrap().unwrap();
    assert_eq!(receipt.status, 201);
    assert_eq!(receipt.statement_ref, Some(server.url("/statement/1")));
    assert_eq!(receipt.location, Some(server.url("/edit/1")));

    let deposits = server.deposits();
    assert_eq!(deposits.len(), 1);
    let request = &deposits[0];
    assert_eq!(
        request.headers.get("content-disposition").map(String::as_str),
        Some("attachment; filename=Article.tar.gz")
    );
    assert_eq!(
        request.headers.get("content-type").map(String::as_str),
        Some("application/gzip")
    );
    assert!(request.headers.contains_key("authorization"));
    assert_eq!(
        package.metadata().size_bytes(),
        Some(request.body.len() as u64)
    );
}

#[test]
fn test_corrupted_md5_is_a_checksum_mismatch() {
    let server = SwordServer::start();
    let package = FixedPackage::new(b"package bytes", METS_PACKAGING, vec![0; 16]);

    let response = send(&server, "/collection/articles", &package);

    assert!(!response.success());
    let err = response.into_result().unwrap_err();
    assert!(
        matches!(err, TransportError::ChecksumMismatch { .. }),
        "unexpected error {:?}",
        err
    );
    assert!(err.to_string().contains("does not match Content-MD5"));
}

#[test]
fn test_unaccepted_packaging_is_unsupported() {
    let server = SwordServer::start();
    let bytes = b"package bytes";
    let package = FixedPackage::new(bytes, "urn:example:bagit", md5::Md5::digest(bytes).to_vec());

    let err = send(&server, "/collection/articles", &package)
        .into_result()
        .unwrap_err();

    match err {
        TransportError::UnsupportedPackaging { packaging, .. } => {
            assert_eq!(packaging, "urn:example:bagit")
        }
        other => panic!("expected unsupported packaging, got {:?}", other),
    }
}

#[test]
fn test_collection_missing_from_service_document() {
    let server = SwordServer::start();
    let bytes = b"package bytes";
    let package = FixedPackage::new(bytes, METS_PACKAGING, md5::Md5::digest(bytes).to_vec());

    let err = send(&server, "/collection/unknown", &package)
        .into_result()
        .unwrap_err();

    assert!(matches!(err, TransportError::InvalidCollection { .. }), "{:?}", err);
    assert!(server.deposits().is_empty(), "nothing should be posted");
}

#[test]
fn test_collection_gone_on_the_server() {
    let server = SwordServer::start();
    let bytes = b"package bytes";
    let package = FixedPackage::new(bytes, METS_PACKAGING, md5::Md5::digest(bytes).to_vec());

    let err = send(&server, "/collection/retired", &package)
        .into_result()
        .unwrap_err();

    match err {
        TransportError::InvalidCollection { collection, .. } => {
            assert_eq!(collection, server.url("/collection/retired"))
        }
        other => panic!("expected invalid collection, got {:?}", other),
    }
}

#[test]
fn test_wrong_service_document_url_fails_to_open() {
    let server = SwordServer::start();
    let hints = server
        .hints("/collection/articles")
        .with(keys::SWORD_SERVICE_DOC_URL, server.url("/nope"));

    let err = Sword2Transport::http().open(&hints).err().unwrap();
    assert!(matches!(err, TransportError::Protocol { .. }), "{:?}", err);
}
