//! Directory-of-JSON-documents store
//!
//! Layout: `<root>/<kind>/<escaped id>.json`, each file holding
//! `{"version": n, "body": {...}}`. Documents are replaced atomically by
//! renaming a fully written temporary file over the old one.
//!
//! Version checks are serialized within one process. Creation is atomic
//! across processes (no-clobber rename); replacement is not, so several
//! processes sharing one directory get last-writer-wins for concurrent
//! updates of the same document.

use pass_deposit_core_critical::{
    DocumentStore, StoreError, StoreResult, VersionedDocument, WritePrecondition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::trace;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u64,
    body: Value,
}

pub struct JsonDirStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDirStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: &str) -> PathBuf {
        self.root.join(escape(kind))
    }

    fn path(&self, kind: &str, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", escape(id)))
    }

    fn read(&self, kind: &str, id: &str) -> StoreResult<Option<Envelope>> {
        let path = self.path(kind, id);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                kind: kind.to_string(),
                id: id.to_string(),
                source,
            })
    }
}

/// Keep `[A-Za-z0-9._-]`, percent-encode every other byte
fn escape(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for (i, byte) in id.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if safe {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

fn unescape(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

impl DocumentStore for JsonDirStore {
    fn get(&self, kind: &str, id: &str) -> StoreResult<VersionedDocument> {
        let envelope = self.read(kind, id)?.ok_or_else(|| StoreError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        })?;
        Ok(VersionedDocument {
            version: envelope.version,
            body: envelope.body,
        })
    }

    fn put(
        &self,
        kind: &str,
        id: &str,
        body: Value,
        precondition: WritePrecondition,
    ) -> StoreResult<u64> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store write lock poisoned".to_string()))?;

        let current = self.read(kind, id)?.map(|e| e.version);
        let next = match (precondition, current) {
            (WritePrecondition::DoesNotExist, None) => 1,
            (WritePrecondition::MatchesVersion(expected), Some(found)) if expected == found => {
                found + 1
            }
            (precondition, found) => {
                return Err(StoreError::Conflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    expected: match precondition {
                        WritePrecondition::DoesNotExist => None,
                        WritePrecondition::MatchesVersion(v) => Some(v),
                    },
                    current: found,
                })
            }
        };

        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)?;
        let envelope = Envelope {
            version: next,
            body,
        };
        let bytes = serde_json::to_vec_pretty(&envelope).map_err(|source| {
            StoreError::Serialization {
                kind: kind.to_string(),
                id: id.to_string(),
                source,
            }
        })?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        let path = self.path(kind, id);
        let persisted = if next == 1 {
            temp.persist_noclobber(&path)
        } else {
            temp.persist(&path)
        };
        persisted.map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                StoreError::Conflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    expected: None,
                    current: None,
                }
            } else {
                StoreError::Io(e.error)
            }
        })?;

        trace!("Wrote {} '{}' version {}", kind, id, next);
        Ok(next)
    }

    fn list(&self, kind: &str) -> StoreResult<Vec<String>> {
        let dir = self.kind_dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json").and_then(unescape) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}
