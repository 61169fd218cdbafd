//! Package manager error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Package manager error codes.
pub mod codes {
    pub const PKG_MANIFEST_MISSING: &str = "PKG_MANIFEST_MISSING";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_MANIFEST_WRITE_FAILED: &str = "PKG_MANIFEST_WRITE_FAILED";
    pub const PKG_LOCK_INVALID_JSON: &str = "PKG_LOCK_INVALID_JSON";
    pub const PKG_LOCK_WRITE_FAILED: &str = "PKG_LOCK_WRITE_FAILED";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_ARCHIVE_ERROR: &str = "PKG_ARCHIVE_ERROR";
    pub const PKG_NO_COMPATIBLE_VERSION: &str = "PKG_NO_COMPATIBLE_VERSION";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_PATH_MISSING: &str = "PKG_PATH_MISSING";
    pub const PKG_STORE_IO: &str = "PKG_STORE_IO";
    pub const PKG_LINK_FAILED: &str = "PKG_LINK_FAILED";
    pub const PKG_VENDOR_WRITE_FAILED: &str = "PKG_VENDOR_WRITE_FAILED";
}

/// Package manager error.
#[derive(Debug, Error)]
pub enum PkgError {
    #[error("composer.json not found in {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("Invalid JSON in {}: {message}", .path.display())]
    CorruptManifest { path: PathBuf, message: String },

    #[error("Failed to write {}: {source}", .path.display())]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in lock file {}: {message}", .path.display())]
    CorruptLockFile { path: PathBuf, message: String },

    #[error("Failed to write lock file {}: {source}", .path.display())]
    LockFileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("No compatible version of {name} for constraint '{constraint}'")]
    NoCompatibleVersion { name: String, constraint: String },

    #[error("Package {0} not found in global store")]
    PackageNotFound(String),

    #[error("Package path does not exist: {}", .0.display())]
    PackagePathMissing(PathBuf),

    #[error("Store I/O error: {0}")]
    StoreIo(String),

    #[error("Failed to create link: {0}")]
    LinkCreation(String),

    #[error("Failed to write {}: {source}", .path.display())]
    VendorIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PkgError {
    /// Get the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestMissing(_) => codes::PKG_MANIFEST_MISSING,
            Self::CorruptManifest { .. } => codes::PKG_MANIFEST_INVALID,
            Self::ManifestIo { .. } => codes::PKG_MANIFEST_WRITE_FAILED,
            Self::CorruptLockFile { .. } => codes::PKG_LOCK_INVALID_JSON,
            Self::LockFileIo { .. } => codes::PKG_LOCK_WRITE_FAILED,
            Self::Registry(_) => codes::PKG_REGISTRY_ERROR,
            Self::Archive(_) => codes::PKG_ARCHIVE_ERROR,
            Self::NoCompatibleVersion { .. } => codes::PKG_NO_COMPATIBLE_VERSION,
            Self::PackageNotFound(_) => codes::PKG_NOT_FOUND,
            Self::PackagePathMissing(_) => codes::PKG_PATH_MISSING,
            Self::StoreIo(_) => codes::PKG_STORE_IO,
            Self::LinkCreation(_) => codes::PKG_LINK_FAILED,
            Self::VendorIo { .. } => codes::PKG_VENDOR_WRITE_FAILED,
        }
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create an archive (download or extraction) error.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a store I/O error.
    pub fn store_io(msg: impl Into<String>) -> Self {
        Self::StoreIo(msg.into())
    }

    /// Create a link creation error.
    pub fn link_failed(msg: impl Into<String>) -> Self {
        Self::LinkCreation(msg.into())
    }

    /// Create a no-compatible-version error.
    #[must_use]
    pub fn no_compatible_version(name: &str, constraint: &str) -> Self {
        Self::NoCompatibleVersion {
            name: name.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::registry(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::registry(format!("Connection failed: {e}"))
        } else {
            Self::registry(e.to_string())
        }
    }
}
