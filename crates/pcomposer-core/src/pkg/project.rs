//! Project-level operations.
//!
//! A [`Project`] ties one project directory to the global store and a
//! registry, and sequences manifest -> lockfile -> installer -> vendor links
//! -> autoloader for every command.
//!
//! Platform requirements (`php`, `ext-*`, ...) in the manifest are never
//! installed, locked or linked.

use super::autoload;
use super::error::PkgError;
use super::install::{filter_platform, InstallReport, PackageInstaller};
use super::link::{RepairReport, VendorLinker};
use super::lockfile::{LockEntry, LockFile};
use super::manifest::Manifest;
use super::registry::{Registry, RegistryClient};
use super::store::{GlobalStore, PackageRecord, StoreStats};
use super::version::{GreedyResolver, VersionResolver};
use crate::config::Config;
use crate::paths::{self, VENDOR_DIR};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How `install` obtained its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    /// The manifest declares no installable dependencies.
    NothingToInstall,
    /// Versions came from an up-to-date lockfile.
    FromLock,
    /// Constraints were resolved against the registry and the lockfile rewritten.
    Resolved,
}

/// Outcome of `install`, `update` and `require`.
#[derive(Debug, Clone, Serialize)]
pub struct InstallSummary {
    pub mode: InstallMode,
    /// Direct dependencies with the version each one is locked to.
    pub locked: BTreeMap<String, String>,
    #[serde(flatten)]
    pub report: InstallReport,
    pub linked: Vec<PathBuf>,
    pub autoload: Option<PathBuf>,
}

impl InstallSummary {
    fn nothing() -> Self {
        Self {
            mode: InstallMode::NothingToInstall,
            locked: BTreeMap::new(),
            report: InstallReport::default(),
            linked: Vec::new(),
            autoload: None,
        }
    }
}

/// Outcome of `remove`.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveSummary {
    pub name: String,
    pub removed_from_manifest: bool,
    pub unlinked: bool,
    pub autoload: PathBuf,
}

/// One manifest dependency as shown by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedPackage {
    pub name: String,
    pub constraint: String,
    pub dev: bool,
    /// Latest version in the global store.
    pub installed: Option<String>,
}

/// Lockfile summary for `lock`.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub path: PathBuf,
    pub generated: Option<String>,
    pub packages: BTreeMap<String, LockEntry>,
}

/// A project directory bound to a store and a registry.
pub struct Project<R = RegistryClient> {
    root: PathBuf,
    vendor_dir: PathBuf,
    store: GlobalStore,
    registry: R,
    resolver: Box<dyn VersionResolver>,
}

impl Project<RegistryClient> {
    /// Open the project containing `config.cwd`, using the configured store
    /// and registry.
    ///
    /// # Errors
    /// Returns `StoreIo` if the store cannot be opened, or `Registry` if the
    /// registry URL is invalid.
    pub fn open(config: &Config) -> Result<Self, PkgError> {
        let root = paths::project_root(&config.cwd);
        let store = GlobalStore::open(paths::store_dir(config.store_dir.as_deref()))?;
        let registry = RegistryClient::new(&config.registry_url, config.http_timeout)?;
        debug!(root = %root.display(), store = %store.root().display(), registry = %registry.base_url(), "opened project");
        Ok(Self::new(root, store, registry))
    }
}

impl<R: Registry> Project<R> {
    /// Bind `root` to an opened store and a registry.
    pub fn new(root: impl Into<PathBuf>, store: GlobalStore, registry: R) -> Self {
        let root = root.into();
        Self {
            vendor_dir: root.join(VENDOR_DIR),
            root,
            store,
            registry,
            resolver: Box::new(GreedyResolver),
        }
    }

    /// Replace the version resolver.
    pub fn with_resolver(mut self, resolver: impl VersionResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    #[must_use]
    pub fn store(&self) -> &GlobalStore {
        &self.store
    }

    /// Install the manifest's dependencies.
    ///
    /// An up-to-date lockfile is installed as locked; otherwise every
    /// constraint is resolved again and the lockfile rewritten. Steps already
    /// completed are kept when a later one fails.
    ///
    /// # Errors
    /// Returns `ManifestMissing` without a `composer.json`, and propagates
    /// lockfile, registry, archive, store and link errors.
    pub fn install(&mut self) -> Result<InstallSummary, PkgError> {
        let manifest = Manifest::load_required(&self.root)?;
        let (require, require_dev) = installable(&manifest);
        if require.is_empty() && require_dev.is_empty() {
            info!("no dependencies to install");
            return Ok(InstallSummary::nothing());
        }

        let mut lock = LockFile::load(&self.root)?;
        let (mode, report) = if lock.exists() && lock.is_up_to_date(&require, &require_dev) {
            info!(path = %lock.path().display(), "installing from lock file");
            (InstallMode::FromLock, self.install_from_lock(&mut lock)?)
        } else {
            info!(exists = lock.exists(), "lock file missing or outdated, resolving");
            let report = self.resolve_and_lock(&mut lock, &require, &require_dev)?;
            (InstallMode::Resolved, report)
        };

        self.finish(mode, report, &manifest, &lock)
    }

    /// Drop the lockfile and resolve every constraint again.
    ///
    /// # Errors
    /// Propagates lockfile, registry, archive, store and link errors.
    pub fn update(&mut self) -> Result<InstallSummary, PkgError> {
        let manifest = Manifest::load(&self.root)?;
        let mut lock = LockFile::empty(&self.root);
        lock.delete()?;

        let (require, require_dev) = installable(&manifest);
        if require.is_empty() && require_dev.is_empty() {
            info!("no dependencies to update");
            return Ok(InstallSummary::nothing());
        }

        let report = self.resolve_and_lock(&mut lock, &require, &require_dev)?;
        self.finish(InstallMode::Resolved, report, &manifest, &lock)
    }

    /// Add `name` to the manifest, then install.
    ///
    /// The manifest is created when missing and keeps the new entry even if
    /// the install fails.
    ///
    /// # Errors
    /// Propagates manifest write errors and everything `install` can return.
    pub fn require(
        &mut self,
        name: &str,
        constraint: Option<&str>,
        dev: bool,
    ) -> Result<InstallSummary, PkgError> {
        let mut manifest = Manifest::load(&self.root)?;
        manifest.add_dependency(name, constraint, dev)?;
        info!(package = name, constraint = constraint.unwrap_or("*"), dev, "added to manifest");
        self.install()
    }

    /// Remove `name` from the manifest, the lockfile and `vendor/`.
    ///
    /// # Errors
    /// Propagates manifest, lockfile, link and autoloader write errors.
    pub fn remove(&mut self, name: &str) -> Result<RemoveSummary, PkgError> {
        let mut manifest = Manifest::load(&self.root)?;
        let removed_from_manifest = manifest.remove_dependency(name)?;

        let mut lock = LockFile::load(&self.root)?;
        if lock.exists() && lock.locked_packages().contains_key(name) {
            lock.unlock_package(name)?;
        }

        let unlinked = VendorLinker::new(&self.vendor_dir, &self.store).remove_package(name)?;
        let autoload = self.write_autoload(&manifest, &lock)?;
        info!(package = name, removed_from_manifest, unlinked, "removed");

        Ok(RemoveSummary {
            name: name.to_string(),
            removed_from_manifest,
            unlinked,
            autoload,
        })
    }

    /// Manifest dependencies with their installed versions.
    ///
    /// # Errors
    /// Returns `CorruptManifest` if `composer.json` is malformed.
    pub fn list(&self) -> Result<Vec<ListedPackage>, PkgError> {
        let manifest = Manifest::load(&self.root)?;
        Ok(manifest
            .dependencies()
            .into_iter()
            .map(|(name, constraint)| ListedPackage {
                dev: manifest.is_dev(&name),
                installed: self.store.latest_version(&name),
                name,
                constraint,
            })
            .collect())
    }

    /// Structural problems in `composer.json`; empty when it is valid.
    ///
    /// # Errors
    /// Returns `ManifestMissing` without a `composer.json`, or `CorruptManifest`
    /// if it is not a JSON object.
    pub fn validate(&self) -> Result<Vec<String>, PkgError> {
        Ok(Manifest::load_required(&self.root)?.validate())
    }

    /// The store's latest record for `name`.
    #[must_use]
    pub fn show(&self, name: &str) -> Option<PackageRecord> {
        self.store.record(name, None).cloned()
    }

    /// Regenerate `vendor/autoload.php`.
    ///
    /// # Errors
    /// Returns manifest or lockfile parse errors, or `VendorIo`.
    pub fn dump_autoload(&self) -> Result<PathBuf, PkgError> {
        let manifest = Manifest::load(&self.root)?;
        let lock = LockFile::load(&self.root)?;
        self.write_autoload(&manifest, &lock)
    }

    /// Empty the global store.
    ///
    /// # Errors
    /// Returns `StoreIo` if the store cannot be cleared.
    pub fn clear_cache(&mut self) -> Result<(), PkgError> {
        self.store.clear_cache()
    }

    /// The lockfile's contents, or `None` when there is no lockfile.
    ///
    /// # Errors
    /// Returns `CorruptLockFile` if the lockfile is malformed.
    pub fn lock_info(&self) -> Result<Option<LockInfo>, PkgError> {
        let lock = LockFile::load(&self.root)?;
        if !lock.exists() {
            return Ok(None);
        }
        Ok(Some(LockInfo {
            path: lock.path().to_path_buf(),
            generated: lock.generated().map(str::to_string),
            packages: lock.locked_packages(),
        }))
    }

    /// Delete the lockfile, returning whether one existed.
    ///
    /// # Errors
    /// Returns `LockFileIo` if the file cannot be removed.
    pub fn unlock(&self) -> Result<bool, PkgError> {
        // Skip parsing so that a corrupt lockfile can still be removed
        LockFile::empty(&self.root).delete()
    }

    #[must_use]
    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Recreate broken vendor links, preferring locked versions.
    ///
    /// # Errors
    /// Returns lockfile parse errors or link errors.
    pub fn repair_links(&self) -> Result<RepairReport, PkgError> {
        let lock = LockFile::load(&self.root)?;
        let locked = locked_versions(&lock);
        VendorLinker::new(&self.vendor_dir, &self.store).repair_links(&locked)
    }

    fn install_from_lock(&mut self, lock: &mut LockFile) -> Result<InstallReport, PkgError> {
        let mut installer =
            PackageInstaller::new(&mut self.store, &self.registry, self.resolver.as_ref())?;

        for (name, entry) in lock.locked_packages() {
            if let Some(version) = &entry.version {
                debug!(package = %name, version = %version, "installing locked version");
                installer.install(&name, version)?;
                continue;
            }

            // Placeholder left by an interrupted resolve
            let constraint = entry.constraint.as_deref().unwrap_or("*");
            let version = installer.install_and_resolve(&name, constraint)?;
            let dependencies = recorded_dependencies(installer.store(), &name, &version);
            let dev = lock.data().packages_dev.contains_key(&name);
            lock.lock_package(&name, &version, dependencies, dev)?;
        }

        Ok(installer.into_report())
    }

    fn resolve_and_lock(
        &mut self,
        lock: &mut LockFile,
        require: &BTreeMap<String, String>,
        require_dev: &BTreeMap<String, String>,
    ) -> Result<InstallReport, PkgError> {
        lock.update_from_manifest(require, require_dev)?;

        let mut wanted = require.clone();
        wanted.extend(require_dev.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut installer =
            PackageInstaller::new(&mut self.store, &self.registry, self.resolver.as_ref())?;
        for (name, constraint) in &wanted {
            let version = installer.install_and_resolve(name, constraint)?;
            let dependencies = recorded_dependencies(installer.store(), name, &version);
            lock.lock_package(name, &version, dependencies, require_dev.contains_key(name))?;
        }

        Ok(installer.into_report())
    }

    fn finish(
        &self,
        mode: InstallMode,
        report: InstallReport,
        manifest: &Manifest,
        lock: &LockFile,
    ) -> Result<InstallSummary, PkgError> {
        let (require, require_dev) = installable(manifest);
        let pins: BTreeMap<String, Option<String>> = require
            .keys()
            .chain(require_dev.keys())
            .map(|name| (name.clone(), lock.locked_version(name)))
            .collect();

        let linked = VendorLinker::new(&self.vendor_dir, &self.store).create_links(&pins)?;
        let autoload = self.write_autoload(manifest, lock)?;

        let locked = pins
            .into_iter()
            .filter_map(|(name, version)| version.map(|v| (name, v)))
            .collect();

        Ok(InstallSummary {
            mode,
            locked,
            report,
            linked,
            autoload: Some(autoload),
        })
    }

    fn write_autoload(&self, manifest: &Manifest, lock: &LockFile) -> Result<PathBuf, PkgError> {
        let (require, require_dev) = installable(manifest);
        let packages: Vec<(String, PathBuf)> = require
            .keys()
            .chain(require_dev.keys())
            .filter_map(|name| {
                let locked = lock
                    .locked_version(name)
                    .filter(|v| self.store.has_package(name, v));
                let path = self.store.get_path(name, locked.as_deref())?;
                Some((name.clone(), path))
            })
            .collect();

        let content = autoload::generate(&packages, &self.root, manifest.autoload());
        autoload::dump(&self.vendor_dir, &content)
    }
}

/// Manifest sections without platform requirements.
fn installable(manifest: &Manifest) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    (
        filter_platform(&manifest.require()),
        filter_platform(&manifest.require_dev()),
    )
}

fn recorded_dependencies(
    store: &GlobalStore,
    name: &str,
    version: &str,
) -> BTreeMap<String, String> {
    store
        .record(name, Some(version))
        .map(|r| r.dependencies.clone())
        .unwrap_or_default()
}

fn locked_versions(lock: &LockFile) -> BTreeMap<String, String> {
    lock.locked_packages()
        .into_iter()
        .filter_map(|(name, entry)| entry.version.map(|v| (name, v)))
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::paths::{LOCKFILE_NAME, MANIFEST_NAME};
    use crate::pkg::testing::FakeRegistry;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        project: TempDir,
        store: TempDir,
        registry: FakeRegistry,
    }

    impl Fixture {
        fn new(manifest: &serde_json::Value) -> Self {
            let project = tempdir().unwrap();
            fs::write(project.path().join(MANIFEST_NAME), manifest.to_string()).unwrap();
            let registry = FakeRegistry::new()
                .with_package("vendor/pkg", "1.0.0", &[])
                .with_package("vendor/pkg", "1.1.0", &[("php", ">=8.1"), ("psr/log", "^3.0")])
                .with_package("vendor/pkg", "2.0.0", &[])
                .with_package("psr/log", "3.0.0", &[])
                .with_package("acme/dev-tool", "0.9.0", &[]);
            Self {
                project,
                store: tempdir().unwrap(),
                registry,
            }
        }

        fn project(&self) -> Project<&FakeRegistry> {
            let store = GlobalStore::open(self.store.path()).unwrap();
            Project::new(self.project.path(), store, &self.registry)
        }

        fn manifest(&self) -> serde_json::Value {
            let raw = fs::read_to_string(self.project.path().join(MANIFEST_NAME)).unwrap();
            serde_json::from_str(&raw).unwrap()
        }

        fn link(&self, name: &str) -> PathBuf {
            self.project.path().join(VENDOR_DIR).join(name)
        }
    }

    fn simple() -> Fixture {
        Fixture::new(&serde_json::json!({
            "name": "acme/app",
            "require": { "php": ">=8.1", "vendor/pkg": "^1.0" },
            "extra": { "keep": "me" }
        }))
    }

    #[test]
    fn test_fresh_install_resolves_stores_locks_and_links() {
        let fx = simple();
        let mut project = fx.project();

        let summary = project.install().unwrap();

        assert_eq!(summary.mode, InstallMode::Resolved);
        assert_eq!(summary.locked["vendor/pkg"], "1.1.0");
        assert!(!summary.locked.contains_key("php"));

        let stored = project.store().get_path("vendor/pkg", Some("1.1.0")).unwrap();
        assert!(project.store().has_package("vendor/pkg", "1.1.0"));
        assert!(project.store().has_package("psr/log", "3.0.0"));

        let lock = LockFile::load(fx.project.path()).unwrap();
        assert_eq!(lock.locked_version("vendor/pkg").as_deref(), Some("1.1.0"));
        assert_eq!(
            lock.locked_packages()["vendor/pkg"].dependencies.as_ref().unwrap()["psr/log"],
            "^3.0"
        );
        assert!(!lock.is_locked("psr/log"), "only direct dependencies are locked");

        let link = fx.link("vendor/pkg");
        assert_eq!(fs::read_link(&link).unwrap(), fs::canonicalize(stored).unwrap());
        assert!(!fx.link("psr/log").exists());

        let autoload = fs::read_to_string(summary.autoload.unwrap()).unwrap();
        assert!(autoload.contains("// Autoloader for vendor/pkg"));
    }

    #[test]
    fn test_second_install_uses_lock_without_registry_calls() {
        let fx = simple();
        fx.project().install().unwrap();
        let calls = fx.registry.calls();
        fs::remove_dir_all(fx.project.path().join(VENDOR_DIR)).unwrap();

        let summary = fx.project().install().unwrap();

        assert_eq!(summary.mode, InstallMode::FromLock);
        assert_eq!(fx.registry.calls(), calls);
        assert!(summary.report.downloaded.is_empty());
        assert_eq!(summary.locked["vendor/pkg"], "1.1.0");
        assert!(fx.link("vendor/pkg").join("composer.json").is_file());
    }

    #[test]
    fn test_outdated_lock_is_resolved_again() {
        let fx = simple();
        fx.project().install().unwrap();

        let mut project = fx.project();
        project.require("acme/dev-tool", None, true).unwrap();

        let lock = LockFile::load(fx.project.path()).unwrap();
        assert!(lock.data().packages_dev.contains_key("acme/dev-tool"));
        assert_eq!(lock.locked_version("vendor/pkg").as_deref(), Some("1.1.0"));
        assert_eq!(fx.manifest()["require-dev"]["acme/dev-tool"], "*");
        assert!(fx.link("acme/dev-tool").is_dir());
    }

    #[test]
    fn test_placeholder_entries_are_resolved() {
        let fx = simple();
        let mut lock = LockFile::load(fx.project.path()).unwrap();
        let mut require = BTreeMap::new();
        require.insert("vendor/pkg".to_string(), "^1.0".to_string());
        lock.update_from_manifest(&require, &BTreeMap::new()).unwrap();

        let summary = fx.project().install().unwrap();

        assert_eq!(summary.mode, InstallMode::FromLock);
        let lock = LockFile::load(fx.project.path()).unwrap();
        assert_eq!(lock.locked_version("vendor/pkg").as_deref(), Some("1.1.0"));
        assert!(lock.outdated().is_empty());
    }

    #[test]
    fn test_update_deletes_lock_and_resolves() {
        let fx = simple();
        fx.project().install().unwrap();
        let (metadata_before, downloads_before) = fx.registry.calls();

        let summary = fx.project().update().unwrap();

        assert_eq!(summary.mode, InstallMode::Resolved);
        let (metadata_after, downloads_after) = fx.registry.calls();
        assert_eq!(metadata_after, metadata_before + 1);
        assert_eq!(downloads_after, downloads_before);
        assert!(fx.project.path().join(LOCKFILE_NAME).is_file());
    }

    #[test]
    fn test_install_requires_manifest() {
        let fx = simple();
        fs::remove_file(fx.project.path().join(MANIFEST_NAME)).unwrap();

        assert!(matches!(
            fx.project().install(),
            Err(PkgError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_validate_manifest() {
        let fx = simple();
        assert!(fx.project().validate().unwrap().is_empty());

        let fx = Fixture::new(&serde_json::json!({ "name": "Acme App", "require": "vendor/pkg" }));
        assert_eq!(
            fx.project().validate().unwrap(),
            vec!["Invalid package name format", "Invalid 'require' section"]
        );

        fs::remove_file(fx.project.path().join(MANIFEST_NAME)).unwrap();
        assert!(matches!(
            fx.project().validate(),
            Err(PkgError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_install_with_only_platform_requirements() {
        let fx = Fixture::new(&serde_json::json!({ "require": { "php": ">=8.1", "ext-json": "*" } }));

        let summary = fx.project().install().unwrap();

        assert_eq!(summary.mode, InstallMode::NothingToInstall);
        assert_eq!(fx.registry.calls(), (0, 0));
        assert!(!fx.project.path().join(LOCKFILE_NAME).exists());
    }

    #[test]
    fn test_clear_cache_then_list() {
        let fx = simple();
        let mut project = fx.project();
        project.install().unwrap();

        let before = project.list().unwrap();
        let pkg = before.iter().find(|p| p.name == "vendor/pkg").unwrap();
        assert_eq!(pkg.installed.as_deref(), Some("1.1.0"));

        project.clear_cache().unwrap();
        let after = project.list().unwrap();

        assert_eq!(after.len(), 2);
        assert!(after.iter().all(|p| p.installed.is_none()));
        assert_eq!(fx.manifest()["require"]["vendor/pkg"], "^1.0");
    }

    #[test]
    fn test_remove_unlinks_and_rewrites_manifest() {
        let fx = simple();
        let mut project = fx.project();
        project.install().unwrap();
        assert!(fx.link("vendor/pkg").exists());

        let summary = project.remove("vendor/pkg").unwrap();

        assert!(summary.removed_from_manifest);
        assert!(summary.unlinked);
        assert!(fx.link("vendor/pkg").symlink_metadata().is_err());

        let manifest = fx.manifest();
        assert!(manifest["require"].get("vendor/pkg").is_none());
        assert_eq!(manifest["require"]["php"], ">=8.1");
        assert_eq!(manifest["extra"]["keep"], "me");
        assert_eq!(manifest["name"], "acme/app");

        let lock = LockFile::load(fx.project.path()).unwrap();
        assert!(!lock.locked_packages().contains_key("vendor/pkg"));
        assert!(project.store().has_package("vendor/pkg", "1.1.0"));
    }

    #[test]
    fn test_show_and_lock_info() {
        let fx = simple();
        let mut project = fx.project();

        assert!(project.show("vendor/pkg").is_none());
        assert!(project.lock_info().unwrap().is_none());

        project.install().unwrap();

        let record = project.show("vendor/pkg").unwrap();
        assert_eq!(record.version, "1.1.0");
        assert_eq!(record.dependencies["psr/log"], "^3.0");

        let info = project.lock_info().unwrap().unwrap();
        assert_eq!(info.path, fx.project.path().join(LOCKFILE_NAME));
        assert!(info.generated.is_some());
        assert_eq!(info.packages["vendor/pkg"].version.as_deref(), Some("1.1.0"));

        assert!(project.unlock().unwrap());
        assert!(!project.unlock().unwrap());
        assert!(project.lock_info().unwrap().is_none());
    }

    #[test]
    fn test_unlock_corrupt_lockfile() {
        let fx = simple();
        fs::write(fx.project.path().join(LOCKFILE_NAME), "{ nope").unwrap();

        assert!(matches!(
            fx.project().install(),
            Err(PkgError::CorruptLockFile { .. })
        ));
        assert!(fx.project().unlock().unwrap());
    }

    #[test]
    fn test_repair_after_clear_cache_and_reinstall() {
        let fx = simple();
        let mut project = fx.project();
        project.install().unwrap();
        project.clear_cache().unwrap();

        let report = project.repair_links().unwrap();
        assert_eq!(report.removed, vec!["vendor/pkg".to_string()]);

        let summary = project.install().unwrap();
        assert_eq!(summary.mode, InstallMode::FromLock);
        assert!(summary
            .report
            .downloaded
            .iter()
            .any(|p| p.name == "vendor/pkg" && p.version == "1.1.0"));
        assert!(fx.link("vendor/pkg").join("composer.json").is_file());
    }

    #[test]
    fn test_links_follow_lock_not_latest_in_store() {
        let fx = simple();
        fx.project().install().unwrap();

        // Another project pulls a newer version into the shared store
        let other_dir = tempdir().unwrap();
        fs::write(
            other_dir.path().join(MANIFEST_NAME),
            r#"{"require": {"vendor/pkg": "2.0.0"}}"#,
        )
        .unwrap();
        let store = GlobalStore::open(fx.store.path()).unwrap();
        Project::new(other_dir.path(), store, &fx.registry)
            .install()
            .unwrap();

        let mut project = fx.project();
        assert_eq!(
            project.store().latest_version("vendor/pkg").as_deref(),
            Some("2.0.0")
        );
        let summary = project.install().unwrap();

        assert_eq!(summary.mode, InstallMode::FromLock);
        let expected = project.store().get_path("vendor/pkg", Some("1.1.0")).unwrap();
        assert_eq!(
            fs::read_link(fx.link("vendor/pkg")).unwrap(),
            fs::canonicalize(expected).unwrap()
        );
    }

    #[test]
    fn test_registry_failure_keeps_partial_state() {
        let fx = Fixture::new(&serde_json::json!({
            "require": { "vendor/pkg": "^1.0", "zz/missing": "^1.0" }
        }));

        let err = fx.project().install().unwrap_err();

        assert!(matches!(err, PkgError::Registry(_)));
        let lock = LockFile::load(fx.project.path()).unwrap();
        assert!(lock.is_locked("vendor/pkg"));
        assert!(!lock.is_locked("zz/missing"));
        assert!(fx.project().store().has_package("vendor/pkg", "1.1.0"));
    }
}
