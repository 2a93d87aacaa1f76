/*!
 * Streaming checksum calculation for package resources
 *
 * Every byte written to a package passes through a set of observers, one per
 * requested algorithm, so that all digests of a resource are computed in the
 * same single pass that archives it.
 */

use base64::Engine;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Name used by METS `CHECKSUMTYPE`
    pub fn mets_name(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Sha256 => "SHA-256",
            Algorithm::Sha512 => "SHA-512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha256" => Ok(Algorithm::Sha256),
            "sha512" => Ok(Algorithm::Sha512),
            other => Err(format!("unsupported checksum algorithm '{other}'")),
        }
    }
}

/// A computed digest with its renderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    algorithm: Algorithm,
    value: Vec<u8>,
    hex: String,
    base64: String,
}

impl Checksum {
    pub fn new(algorithm: Algorithm, value: Vec<u8>) -> Self {
        let hex = hex::encode(&value);
        let base64 = base64::engine::general_purpose::STANDARD.encode(&value);
        Self {
            algorithm,
            value,
            hex,
            base64,
        }
    }

    /// Build from a lowercase or uppercase hex rendering
    pub fn from_hex(algorithm: Algorithm, hex_value: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self::new(algorithm, hex::decode(hex_value)?))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    pub fn as_base64(&self) -> &str {
        &self.base64
    }
}

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
    Sha512(Sha512),
}

/// Incrementally computes one digest
pub struct ChecksumObserver {
    hasher: Hasher,
}

impl ChecksumObserver {
    pub fn new(algorithm: Algorithm) -> Self {
        let hasher = match algorithm {
            Algorithm::Md5 => Hasher::Md5(Md5::new()),
            Algorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            Algorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        };
        Self { hasher }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.hasher {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Checksum {
        match self.hasher {
            Hasher::Md5(h) => Checksum::new(Algorithm::Md5, h.finalize().to_vec()),
            Hasher::Sha256(h) => Checksum::new(Algorithm::Sha256, h.finalize().to_vec()),
            Hasher::Sha512(h) => Checksum::new(Algorithm::Sha512, h.finalize().to_vec()),
        }
    }
}

/// Length and digests of a byte sequence that passed through observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub length: u64,
    pub checksums: Vec<Checksum>,
}

struct Observers {
    observers: Vec<ChecksumObserver>,
    length: u64,
}

impl Observers {
    fn new(algorithms: &[Algorithm]) -> Self {
        Self {
            observers: algorithms.iter().map(|a| ChecksumObserver::new(*a)).collect(),
            length: 0,
        }
    }

    fn observe(&mut self, data: &[u8]) {
        self.length += data.len() as u64;
        for observer in &mut self.observers {
            observer.update(data);
        }
    }

    fn finish(self) -> Observation {
        Observation {
            length: self.length,
            checksums: self
                .observers
                .into_iter()
                .map(ChecksumObserver::finish)
                .collect(),
        }
    }
}

/// Reader that feeds everything it reads to a set of observers
pub struct ObservingReader<R> {
    inner: R,
    observers: Observers,
}

impl<R: Read> ObservingReader<R> {
    pub fn new(inner: R, algorithms: &[Algorithm]) -> Self {
        Self {
            inner,
            observers: Observers::new(algorithms),
        }
    }

    /// Bytes observed so far
    pub fn length(&self) -> u64 {
        self.observers.length
    }

    pub fn finish(self) -> (R, Observation) {
        (self.inner, self.observers.finish())
    }
}

impl<R: Read> Read for ObservingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.observers.observe(&buf[..n]);
        Ok(n)
    }
}

/// Writer that feeds everything it writes to a set of observers
pub struct ObservingWriter<W> {
    inner: W,
    observers: Observers,
}

impl<W: Write> ObservingWriter<W> {
    pub fn new(inner: W, algorithms: &[Algorithm]) -> Self {
        Self {
            inner,
            observers: Observers::new(algorithms),
        }
    }

    pub fn finish(self) -> (W, Observation) {
        (self.inner, self.observers.finish())
    }
}

impl<W: Write> Write for ObservingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.observers.observe(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
