//! Package installation into the global store.
//!
//! Installing a package resolves its constraint against the registry, skips
//! the download when the store already has the resolved version, and
//! otherwise downloads, extracts, stores, and recurses into the package's own
//! requirements depth-first.

use super::archive;
use super::error::PkgError;
use super::registry::{string_map, PackageMetadata, Registry};
use super::store::{sanitize, GlobalStore};
use super::version::VersionResolver;
use pcomposer_util::fs::remove_path;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Platform requirement names that are not installable packages.
const PLATFORM_NAMES: &[&str] = &[
    "php",
    "hhvm",
    "composer",
    "composer-plugin-api",
    "composer-runtime-api",
];

/// Platform requirement prefixes.
const PLATFORM_PREFIXES: &[&str] = &["php-", "ext-", "lib-"];

/// Whether `name` is a platform requirement rather than a package.
///
/// Real packages are always `vendor/name`, so anything with a `/` is a package.
#[must_use]
pub fn is_platform_package(name: &str) -> bool {
    if name.contains('/') {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    PLATFORM_NAMES.contains(&lower.as_str())
        || PLATFORM_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Drop platform requirements from a requirement map.
#[must_use]
pub fn filter_platform(require: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    require
        .iter()
        .filter(|(name, _)| !is_platform_package(name))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// A package version touched during installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// What an installer did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    /// Packages downloaded and added to the store.
    pub downloaded: Vec<InstalledPackage>,
    /// Packages already present in the store.
    pub reused: Vec<InstalledPackage>,
    /// Closest-match substitutions and similar non-fatal notes.
    pub warnings: Vec<String>,
}

/// Installs packages and their requirements into a [`GlobalStore`].
///
/// Downloads and extractions happen in a private temp directory that is
/// removed when the installer is dropped.
pub struct PackageInstaller<'a> {
    store: &'a mut GlobalStore,
    registry: &'a dyn Registry,
    resolver: &'a dyn VersionResolver,
    work_dir: TempDir,
    downloads: usize,
    /// Packages on the current recursion path, with the version being installed.
    in_progress: HashMap<String, String>,
    report: InstallReport,
}

impl<'a> PackageInstaller<'a> {
    /// Create an installer with a fresh temp working directory.
    ///
    /// # Errors
    /// Returns `StoreIo` if the temp directory cannot be created.
    pub fn new(
        store: &'a mut GlobalStore,
        registry: &'a dyn Registry,
        resolver: &'a dyn VersionResolver,
    ) -> Result<Self, PkgError> {
        let work_dir = tempfile::Builder::new()
            .prefix("pcomposer_")
            .tempdir()
            .map_err(|e| PkgError::store_io(format!("Failed to create temp directory: {e}")))?;

        Ok(Self {
            store,
            registry,
            resolver,
            work_dir,
            downloads: 0,
            in_progress: HashMap::new(),
            report: InstallReport::default(),
        })
    }

    /// The store packages are installed into.
    #[must_use]
    pub fn store(&self) -> &GlobalStore {
        &*self.store
    }

    /// Private working directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// What has been done so far.
    #[must_use]
    pub fn report(&self) -> &InstallReport {
        &self.report
    }

    /// Consume the installer, removing its temp directory.
    #[must_use]
    pub fn into_report(self) -> InstallReport {
        self.report
    }

    /// Resolve `constraint` for `name`, install it and its requirements, and
    /// return the resolved version.
    ///
    /// # Errors
    /// Propagates registry, resolution, archive and store errors unchanged.
    pub fn install_and_resolve(&mut self, name: &str, constraint: &str) -> Result<String, PkgError> {
        if let Some(version) = self.in_progress.get(name) {
            debug!(package = name, version = %version, "already being installed higher up, skipping");
            return Ok(version.clone());
        }

        let metadata = self.registry.fetch_metadata(name)?;
        let resolution = self
            .resolver
            .resolve(name, constraint, &metadata.versions())?;
        if let Some(warning) = resolution.warning {
            warn!("{warning}");
            self.report.warnings.push(warning);
        }
        let version = resolution.version;
        debug!(package = name, constraint, version = %version, "resolved");

        if self.store.has_package(name, &version) {
            self.note_reused(name, &version);
            return Ok(version);
        }

        self.fetch_and_store(name, &version, &metadata)?;
        Ok(version)
    }

    /// Install an already resolved version of `name`.
    ///
    /// A store hit makes no registry call at all.
    ///
    /// # Errors
    /// Returns `NoCompatibleVersion` if the registry no longer offers `version`,
    /// and propagates registry, archive and store errors.
    pub fn install(&mut self, name: &str, version: &str) -> Result<(), PkgError> {
        if self.in_progress.contains_key(name) {
            return Ok(());
        }

        if self.store.has_package(name, version) {
            self.note_reused(name, version);
            return Ok(());
        }

        let metadata = self.registry.fetch_metadata(name)?;
        if metadata.release(version).is_none() {
            return Err(PkgError::no_compatible_version(name, version));
        }
        self.fetch_and_store(name, version, &metadata)
    }

    fn note_reused(&mut self, name: &str, version: &str) {
        debug!(package = name, version, "package already in global store");
        self.report.reused.push(InstalledPackage {
            name: name.to_string(),
            version: version.to_string(),
        });
    }

    fn fetch_and_store(
        &mut self,
        name: &str,
        version: &str,
        metadata: &PackageMetadata,
    ) -> Result<(), PkgError> {
        let release = metadata
            .release(version)
            .ok_or_else(|| PkgError::no_compatible_version(name, version))?;
        let url = release.dist_url.as_deref().ok_or_else(|| {
            PkgError::registry(format!("No download URL for {name} {version}"))
        })?;

        self.downloads += 1;
        let archive_path = self
            .work_dir
            .path()
            .join(format!("package_{}.archive", self.downloads));
        let extract_dir = self
            .work_dir
            .path()
            .join(format!("{}_{}", sanitize(name), sanitize(version)));
        discard(&extract_dir);

        info!(package = name, version, "downloading");
        self.registry.download(url, &archive_path)?;
        let extracted = archive::extract(&archive_path, &extract_dir);
        discard(&archive_path);
        extracted?;

        let dependencies = read_package_requirements(&extract_dir)
            .unwrap_or_else(|| filter_platform(&release.require));

        self.store
            .store(name, version, &extract_dir, dependencies.clone())?;
        discard(&extract_dir);

        self.report.downloaded.push(InstalledPackage {
            name: name.to_string(),
            version: version.to_string(),
        });

        self.in_progress
            .insert(name.to_string(), version.to_string());
        let result = dependencies
            .iter()
            .try_for_each(|(dep, constraint)| self.install_and_resolve(dep, constraint).map(drop));
        self.in_progress.remove(name);

        result
    }
}

/// Remove a scratch file or directory, logging a failure instead of returning it.
///
/// Returns whether `path` is gone afterwards.
fn discard(path: &Path) -> bool {
    match remove_path(path) {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to clean up scratch path");
            false
        }
    }
}

/// Non-platform requirements from the package's own `composer.json`.
///
/// `None` when the package ships no manifest.
fn read_package_requirements(package_dir: &Path) -> Option<BTreeMap<String, String>> {
    let path = package_dir.join("composer.json");
    let content = fs::read_to_string(&path).ok()?;

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(json) => Some(filter_platform(&string_map(json.get("require")))),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable package manifest, ignoring requirements");
            Some(BTreeMap::new())
        }
    }
}
