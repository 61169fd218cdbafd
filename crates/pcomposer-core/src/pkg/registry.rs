//! Packagist-style registry client.

use super::error::PkgError;
use crate::config::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_REGISTRY};
use reqwest::blocking::Client;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Maximum archive size (200 MB).
pub const MAX_ARCHIVE_SIZE: u64 = 200 * 1024 * 1024;

/// One published version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    pub version: String,
    /// Archive download URL (`dist.url`).
    pub dist_url: Option<String>,
    /// Declared requirements (`require`), platform entries included.
    pub require: BTreeMap<String, String>,
}

/// Metadata for one package, versions in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageMetadata {
    pub name: String,
    pub releases: Vec<Release>,
}

impl PackageMetadata {
    /// All published version strings.
    #[must_use]
    pub fn versions(&self) -> Vec<String> {
        self.releases.iter().map(|r| r.version.clone()).collect()
    }

    /// Look up one release.
    #[must_use]
    pub fn release(&self, version: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.version == version)
    }

    /// Parse a registry response body.
    ///
    /// Accepts `{"package": {"versions": {...}}}` and bare `{"versions": {...}}`.
    ///
    /// # Errors
    /// Returns `Registry` if neither shape is present.
    pub fn from_json(name: &str, body: &serde_json::Value) -> Result<Self, PkgError> {
        let versions = body
            .get("package")
            .and_then(|p| p.get("versions"))
            .or_else(|| body.get("versions"))
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| {
                PkgError::registry(format!("Registry response for '{name}' has no versions"))
            })?;

        let releases = versions
            .iter()
            .map(|(version, info)| Release {
                version: version.clone(),
                dist_url: info
                    .get("dist")
                    .and_then(|d| d.get("url"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                require: string_map(info.get("require")),
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            releases,
        })
    }
}

/// Object of string values -> map; anything else (including PHP's `[]`) -> empty.
pub(crate) fn string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    value
        .and_then(serde_json::Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Source of package metadata and archives.
pub trait Registry {
    /// Fetch the published versions of `name`.
    ///
    /// # Errors
    /// Returns `Registry` if the registry is unreachable or the response is malformed.
    fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, PkgError>;

    /// Download the archive at `url` into the file `dest`.
    ///
    /// # Errors
    /// Returns `Archive` if the download fails.
    fn download(&self, url: &str, dest: &Path) -> Result<(), PkgError>;
}

impl<R: Registry + ?Sized> Registry for &R {
    fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, PkgError> {
        (**self).fetch_metadata(name)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), PkgError> {
        (**self).download(url, dest)
    }
}

/// HTTP registry client.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
    max_archive_size: u64,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL and per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PkgError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(concat!("pcomposer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http,
            max_archive_size: MAX_ARCHIVE_SIZE,
        })
    }

    /// Client for the public Packagist registry.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn packagist() -> Result<Self, PkgError> {
        Self::new(
            DEFAULT_REGISTRY,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        )
    }

    /// Override the download size cap (defaults to [`MAX_ARCHIVE_SIZE`]).
    #[must_use]
    pub fn with_max_archive_size(mut self, bytes: u64) -> Self {
        self.max_archive_size = bytes;
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn metadata_url(&self, name: &str) -> Result<Url, PkgError> {
        self.base_url
            .join(&format!("{name}.json"))
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))
    }
}

impl Registry for RegistryClient {
    fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, PkgError> {
        let url = self.metadata_url(name)?;
        debug!(package = name, url = %url, "fetching package metadata");

        let response = self.http.get(url.as_str()).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PkgError::registry(format!(
                "Package not found in registry: {name}"
            )));
        }

        if !response.status().is_success() {
            return Err(PkgError::registry(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        let body = response.text()?;
        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| PkgError::registry(format!("Invalid JSON for '{name}': {e}")))?;

        PackageMetadata::from_json(name, &json)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), PkgError> {
        debug!(url, "downloading archive");

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| PkgError::archive(format!("Failed to download '{url}': {e}")))?;

        if !response.status().is_success() {
            return Err(PkgError::archive(format!(
                "Download failed with status {} for '{url}'",
                response.status()
            )));
        }

        let max = self.max_archive_size;
        if let Some(len) = response.content_length() {
            if len > max {
                return Err(PkgError::archive(format!(
                    "Archive too large: {len} bytes (max: {max})"
                )));
            }
        }

        let mut file = File::create(dest)
            .map_err(|e| PkgError::archive(format!("Failed to create {}: {e}", dest.display())))?;
        // One byte past the cap is enough to tell an oversized body apart
        let written = io::copy(&mut response.take(max.saturating_add(1)), &mut file)
            .map_err(|e| PkgError::archive(format!("Failed to save {}: {e}", dest.display())))?;
        drop(file);

        if written > max {
            if let Err(e) = fs::remove_file(dest) {
                warn!(path = %dest.display(), error = %e, "failed to remove oversized archive");
            }
            return Err(PkgError::archive(format!(
                "Archive too large: more than {max} bytes"
            )));
        }

        debug!(url, bytes = written, "archive downloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn packagist_body() -> serde_json::Value {
        serde_json::json!({
            "package": {
                "name": "monolog/monolog",
                "versions": {
                    "3.5.0": {
                        "dist": { "url": "https://example.test/monolog-3.5.0.zip", "type": "zip" },
                        "require": { "php": ">=8.1", "psr/log": "^2.0 || ^3.0" }
                    },
                    "2.9.1": {
                        "dist": { "url": "https://example.test/monolog-2.9.1.zip" },
                        "require": []
                    },
                    "dev-main": {}
                }
            }
        })
    }

    #[test]
    fn test_parse_packagist_shape() {
        let meta = PackageMetadata::from_json("monolog/monolog", &packagist_body()).unwrap();

        assert_eq!(meta.versions(), vec!["3.5.0", "2.9.1", "dev-main"]);
        let release = meta.release("3.5.0").unwrap();
        assert_eq!(
            release.dist_url.as_deref(),
            Some("https://example.test/monolog-3.5.0.zip")
        );
        assert_eq!(release.require.get("psr/log").unwrap(), "^2.0 || ^3.0");
        assert!(meta.release("2.9.1").unwrap().require.is_empty());
        assert!(meta.release("dev-main").unwrap().dist_url.is_none());
    }

    #[test]
    fn test_parse_bare_versions_shape() {
        let body = serde_json::json!({
            "versions": { "1.0.0": { "dist": { "url": "https://example.test/a.zip" } } }
        });
        let meta = PackageMetadata::from_json("acme/a", &body).unwrap();
        assert_eq!(meta.versions(), vec!["1.0.0"]);
    }

    #[test]
    fn test_parse_missing_versions() {
        let body = serde_json::json!({ "status": "error" });
        let err = PackageMetadata::from_json("acme/a", &body).unwrap_err();
        assert!(matches!(err, PkgError::Registry(_)));
    }

    #[test]
    fn test_client_creation() {
        assert!(RegistryClient::packagist().is_ok());
        let client = RegistryClient::new("http://localhost:1/p", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:1/p/");
    }

    #[test]
    fn test_client_invalid_url() {
        assert!(RegistryClient::new("not-a-url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_fetch_metadata_over_http() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/monolog/monolog.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(packagist_body().to_string())
            .create();

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let meta = client.fetch_metadata("monolog/monolog").unwrap();

        mock.assert();
        assert_eq!(meta.releases.len(), 3);
    }

    #[test]
    fn test_fetch_metadata_not_found() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/acme/missing.json").with_status(404).create();

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.fetch_metadata("acme/missing").unwrap_err();
        assert!(matches!(err, PkgError::Registry(_)));
    }

    #[test]
    fn test_fetch_metadata_bad_json() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/acme/bad.json")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create();

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.fetch_metadata("acme/bad").unwrap_err();
        assert!(matches!(err, PkgError::Registry(_)));
    }

    #[test]
    fn test_download_writes_file() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/dist/a.zip")
            .with_status(200)
            .with_body(b"PK\x03\x04payload")
            .create();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("a.zip");

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        client
            .download(&format!("{}/dist/a.zip", server.url()), &dest)
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"PK\x03\x04payload");
    }

    #[test]
    fn test_download_failure_is_archive_error() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/dist/gone.zip").with_status(500).create();
        let dir = tempdir().unwrap();

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .download(
                &format!("{}/dist/gone.zip", server.url()),
                &dir.path().join("gone.zip"),
            )
            .unwrap_err();
        assert!(matches!(err, PkgError::Archive(_)));
    }

    #[test]
    fn test_download_rejects_declared_oversize() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/dist/big.zip")
            .with_status(200)
            .with_body(vec![b'x'; 64])
            .create();
        let dir = tempdir().unwrap();

        let client = RegistryClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_max_archive_size(16);
        let err = client
            .download(
                &format!("{}/dist/big.zip", server.url()),
                &dir.path().join("big.zip"),
            )
            .unwrap_err();
        assert!(matches!(err, PkgError::Archive(_)));
    }

    #[test]
    fn test_download_streams_and_caps_chunked_body() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/dist/chunked.zip")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..8 {
                    w.write_all(&[b'x'; 8])?;
                }
                Ok(())
            })
            .create();
        let dir = tempdir().unwrap();
        let dest = dir.path().join("chunked.zip");
        let url = format!("{}/dist/chunked.zip", server.url());

        let capped = RegistryClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_max_archive_size(16);
        let err = capped.download(&url, &dest).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(!dest.exists());

        let roomy = RegistryClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_max_archive_size(64);
        roomy.download(&url, &dest).unwrap();
        assert_eq!(fs::metadata(&dest).unwrap().len(), 64);
    }
}
