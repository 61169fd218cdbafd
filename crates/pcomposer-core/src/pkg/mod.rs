//! Package manager functionality.
//!
//! Provides utilities for:
//! - Resolving version constraints against published versions
//! - Fetching package metadata from a Packagist-style registry
//! - Downloading and extracting zip and tar.gz archives
//! - Managing the machine-wide package store
//! - Installing packages and their requirements into the store
//! - Reading and editing `composer.json`
//! - Lockfile generation and installation from a lockfile
//! - Creating symlinks/junctions in `vendor/`
//! - Generating `vendor/autoload.php`

pub mod archive;
pub mod autoload;
pub mod error;
pub mod install;
pub mod link;
pub mod lockfile;
pub mod manifest;
pub mod project;
pub mod registry;
pub mod store;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{extract, ArchiveFormat};
pub use error::{codes as pkg_codes, PkgError};
pub use install::{is_platform_package, InstallReport, InstalledPackage, PackageInstaller};
pub use link::{LinkInfo, LinkKind, RepairReport, VendorLinker};
pub use lockfile::{LockData, LockEntry, LockFile};
pub use manifest::{Manifest, DEFAULT_CONSTRAINT};
pub use project::{
    InstallMode, InstallSummary, ListedPackage, LockInfo, Project, RemoveSummary,
};
pub use registry::{PackageMetadata, Registry, RegistryClient, Release, MAX_ARCHIVE_SIZE};
pub use store::{GlobalStore, PackageRecord, StoreStats};
pub use version::{compare_versions, GreedyResolver, Resolution, VersionResolver};
