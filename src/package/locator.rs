//! Resolution of custodial file locations to readable byte sources

use super::error::{PackageError, PackageResult};
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;

/// A parsed custodial file location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A path on the local filesystem
    File(PathBuf),
    /// A resource bundled with the deployment, relative to the bundled root
    Bundled(String),
    /// An HTTP(S) URL
    Http(Url),
}

impl Location {
    /// Classify a location string
    ///
    /// Recognized forms are `file:`, `classpath:` / `classpath*:`, `http:` /
    /// `https:` and bare paths (anything containing a path separator).
    pub fn parse(raw: &str) -> PackageResult<Self> {
        let unresolvable = || PackageError::UnresolvableLocation {
            location: raw.to_string(),
        };

        if let Some(rest) = raw.strip_prefix("file:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(unresolvable());
            }
            return Ok(Location::File(PathBuf::from(path)));
        }

        if let Some(rest) = raw
            .strip_prefix("classpath*:")
            .or_else(|| raw.strip_prefix("classpath:"))
        {
            let name = rest.trim_start_matches('/');
            if name.is_empty() {
                return Err(unresolvable());
            }
            return Ok(Location::Bundled(name.to_string()));
        }

        if raw.starts_with("http:") || raw.starts_with("https:") {
            return Url::parse(raw)
                .map(Location::Http)
                .map_err(|_| unresolvable());
        }

        if raw.contains('/') || raw.contains('\\') {
            return Ok(Location::File(PathBuf::from(raw)));
        }

        Err(unresolvable())
    }
}

/// An opened custodial resource
pub struct LocatedResource {
    pub reader: Box<dyn Read + Send>,
    /// Length in bytes, when the source reports one up front
    pub size: Option<u64>,
}

/// Opens custodial resources by location
pub trait ResourceLocator: Send + Sync {
    /// Check a location without opening it
    fn classify(&self, location: &str) -> PackageResult<Location> {
        Location::parse(location)
    }

    fn open(&self, location: &str) -> PackageResult<LocatedResource>;
}

/// The default locator for files, bundled resources and HTTP(S) URLs
#[derive(Default)]
pub struct Cataloger {
    bundled_root: Option<PathBuf>,
    http: OnceCell<reqwest::blocking::Client>,
}

impl Cataloger {
    pub fn new(bundled_root: Option<PathBuf>) -> Self {
        Self {
            bundled_root,
            http: OnceCell::new(),
        }
    }

    fn open_file(location: &str, path: &Path) -> PackageResult<LocatedResource> {
        let unreadable = |source| PackageError::Unreadable {
            location: location.to_string(),
            source,
        };
        let file = File::open(path).map_err(unreadable)?;
        let size = file.metadata().map_err(unreadable)?.len();
        Ok(LocatedResource {
            reader: Box::new(file),
            size: Some(size),
        })
    }

    fn bundled_path(&self, location: &str, name: &str) -> PackageResult<PathBuf> {
        let root = self
            .bundled_root
            .as_ref()
            .ok_or_else(|| PackageError::NoBundledRoot {
                location: location.to_string(),
            })?;
        let relative = Path::new(name);
        // Bundled names may not climb out of the bundled root
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PackageError::UnresolvableLocation {
                location: location.to_string(),
            });
        }
        Ok(root.join(relative))
    }

    fn client(&self, location: &str) -> PackageResult<&reqwest::blocking::Client> {
        self.http.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .build()
                .map_err(|source| PackageError::Http {
                    location: location.to_string(),
                    source,
                })
        })
    }
}

impl ResourceLocator for Cataloger {
    fn open(&self, location: &str) -> PackageResult<LocatedResource> {
        match Location::parse(location)? {
            Location::File(path) => Self::open_file(location, &path),
            Location::Bundled(name) => {
                let path = self.bundled_path(location, &name)?;
                Self::open_file(location, &path)
            }
            Location::Http(url) => {
                debug!("Retrieving custodial resource {}", url);
                let http_error = |source| PackageError::Http {
                    location: location.to_string(),
                    source,
                };
                let response = self
                    .client(location)?
                    .get(url)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .map_err(http_error)?;
                let size = response.content_length();
                Ok(LocatedResource {
                    reader: Box::new(response),
                    size,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_recognized_forms() {
        assert_eq!(
            Location::parse("file:///tmp/a.pdf").unwrap(),
            Location::File(PathBuf::from("/tmp/a.pdf"))
        );
        assert_eq!(
            Location::parse("file:relative/a.pdf").unwrap(),
            Location::File(PathBuf::from("relative/a.pdf"))
        );
        assert_eq!(
            Location::parse("classpath*:/fixtures/a.pdf").unwrap(),
            Location::Bundled("fixtures/a.pdf".to_string())
        );
        assert_eq!(
            Location::parse("classpath:a.pdf").unwrap(),
            Location::Bundled("a.pdf".to_string())
        );
        assert!(matches!(
            Location::parse("https://example.org/a.pdf").unwrap(),
            Location::Http(_)
        ));
        assert_eq!(
            Location::parse("data/a.pdf").unwrap(),
            Location::File(PathBuf::from("data/a.pdf"))
        );
        assert_eq!(
            Location::parse(r"C:\data\a.pdf").unwrap(),
            Location::File(PathBuf::from(r"C:\data\a.pdf"))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_forms() {
        for raw in ["a.pdf", "mailto:someone", "file:", "classpath:"] {
            let err = Location::parse(raw).unwrap_err();
            assert!(
                matches!(err, PackageError::UnresolvableLocation { .. }),
                "{raw} should not resolve"
            );
            assert!(err.to_string().contains("Unable to resolve the location"));
        }
    }

    #[test]
    fn test_open_file_reports_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"twelve bytes")
            .unwrap();

        let cataloger = Cataloger::default();
        let mut located = cataloger
            .open(&format!("file:{}", path.display()))
            .unwrap();
        let mut content = String::new();
        located.reader.read_to_string(&mut content).unwrap();

        assert_eq!(located.size, Some(12));
        assert_eq!(content, "twelve bytes");
    }

    #[test]
    fn test_bundled_resources_resolve_under_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("fixtures")).unwrap();
        std::fs::write(dir.path().join("fixtures/b.txt"), b"bundled").unwrap();

        let cataloger = Cataloger::new(Some(dir.path().to_path_buf()));
        assert_eq!(cataloger.open("classpath:fixtures/b.txt").unwrap().size, Some(7));
        assert!(matches!(
            cataloger.open("classpath:../escape.txt"),
            Err(PackageError::UnresolvableLocation { .. })
        ));
        assert!(matches!(
            Cataloger::default().open("classpath:fixtures/b.txt"),
            Err(PackageError::NoBundledRoot { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = Cataloger::default()
            .open("/definitely/not/here.pdf")
            .err()
            .unwrap();
        assert!(matches!(err, PackageError::Unreadable { .. }));
    }
}
