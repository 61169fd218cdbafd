//! Global package store.
//!
//! One copy of every installed `(name, version)` lives under the store root,
//! shared by every project on the machine. A single JSON index
//! (`metadata.json`) maps `name@version` to a [`PackageRecord`].
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   metadata.json
//!   .metadata.lock
//!   monolog_monolog/3.5.0/...
//!   psr_log/3.0.0/...
//! ```
//!
//! Index mutations happen under an exclusive file lock and re-read the index
//! first, so two processes sharing a store do not lose each other's entries.

use super::error::PkgError;
use super::version::max_version;
use crate::paths::STORE_INDEX_NAME;
use pcomposer_util::fs::{atomic_write, copy_dir_all, dir_size, remove_path};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lock file guarding index mutations, relative to the store root.
const INDEX_LOCK_NAME: &str = ".metadata.lock";

/// Timestamp format used for `installed_at` and lockfile stamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One installed package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Absolute path of the extracted package tree.
    pub path: PathBuf,
    /// Direct dependencies (name -> constraint) declared by the package.
    #[serde(default, deserialize_with = "map_or_empty_list")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub installed_at: String,
}

/// Accept `{}` as well as the empty list `[]` some writers emit for an empty map.
pub(crate) fn map_or_empty_list<'de, D>(de: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, String>),
        List(Vec<serde_json::Value>),
    }

    match Option::<MapOrList>::deserialize(de)? {
        Some(MapOrList::Map(m)) => Ok(m),
        Some(MapOrList::List(l)) if l.is_empty() => Ok(BTreeMap::new()),
        Some(MapOrList::List(_)) => Err(serde::de::Error::custom(
            "expected an object of name -> constraint",
        )),
        None => Ok(BTreeMap::new()),
    }
}

/// Summary of the store contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_packages: usize,
    /// Bytes of all files under live package paths.
    pub total_size: u64,
    /// Record count per vendor (the part of the name before the first `/`).
    pub packages_by_vendor: BTreeMap<String, usize>,
    pub store_path: PathBuf,
}

type StoreIndex = BTreeMap<String, PackageRecord>;

/// The machine-wide package store.
#[derive(Debug)]
pub struct GlobalStore {
    root: PathBuf,
    index: StoreIndex,
}

impl GlobalStore {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// A missing or unreadable index is treated as empty.
    ///
    /// # Errors
    /// Returns `StoreIo` if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PkgError> {
        let mut root = root.into();
        if root.is_relative() {
            let cwd = std::env::current_dir()
                .map_err(|e| PkgError::store_io(format!("Cannot resolve store path: {e}")))?;
            root = cwd.join(root);
        }

        fs::create_dir_all(&root).map_err(|e| {
            PkgError::store_io(format!(
                "Failed to create store directory {}: {e}",
                root.display()
            ))
        })?;

        let index = load_index(&root.join(STORE_INDEX_NAME));
        debug!(root = %root.display(), packages = index.len(), "opened global store");
        Ok(Self { root, index })
    }

    /// Get the store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index key for a package version.
    #[must_use]
    pub fn package_key(name: &str, version: &str) -> String {
        format!("{name}@{version}")
    }

    /// Deterministic storage path for a package version.
    #[must_use]
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(sanitize(name)).join(sanitize(version))
    }

    /// True if the index has the version and its directory still exists.
    #[must_use]
    pub fn has_package(&self, name: &str, version: &str) -> bool {
        self.index
            .get(&Self::package_key(name, version))
            .is_some_and(|r| r.path.is_dir())
    }

    /// Recorded path of `name@version`, or of the latest version when `version` is `None`.
    ///
    /// The path is returned even if it has since disappeared from disk.
    #[must_use]
    pub fn get_path(&self, name: &str, version: Option<&str>) -> Option<PathBuf> {
        self.record(name, version).map(|r| r.path.clone())
    }

    /// Highest recorded version of `name`.
    #[must_use]
    pub fn latest_version(&self, name: &str) -> Option<String> {
        max_version(self.records_for(name).map(|r| &r.version)).map(str::to_string)
    }

    /// Record for `name@version`, or for the latest version when `version` is `None`.
    #[must_use]
    pub fn record(&self, name: &str, version: Option<&str>) -> Option<&PackageRecord> {
        match version {
            Some(v) => self.index.get(&Self::package_key(name, v)),
            None => {
                let latest = self.latest_version(name)?;
                self.index.get(&Self::package_key(name, &latest))
            }
        }
    }

    /// All records ordered by key.
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.index.values()
    }

    fn records_for<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a PackageRecord> + 'a {
        let prefix = format!("{name}@");
        self.index
            .iter()
            .filter(move |(k, _)| k.starts_with(&prefix))
            .map(|(_, r)| r)
    }

    /// Copy `source` into the store and register it.
    ///
    /// Any previous tree at the target path is replaced. The index entry is
    /// written only after the copy has completed.
    ///
    /// # Errors
    /// Returns `StoreIo` if the copy or the index write fails.
    pub fn store(
        &mut self,
        name: &str,
        version: &str,
        source: &Path,
        dependencies: BTreeMap<String, String>,
    ) -> Result<PathBuf, PkgError> {
        let path = self.package_dir(name, version);

        remove_path(&path).map_err(|e| {
            PkgError::store_io(format!("Failed to clear {}: {e}", path.display()))
        })?;
        copy_dir_all(source, &path).map_err(|e| {
            PkgError::store_io(format!(
                "Failed to copy {} into store: {e}",
                source.display()
            ))
        })?;

        let record = PackageRecord {
            name: name.to_string(),
            version: version.to_string(),
            path: path.clone(),
            dependencies,
            installed_at: timestamp_now(),
        };
        let key = Self::package_key(name, version);
        self.update_index(|index| {
            index.insert(key, record);
            true
        })?;

        info!(package = name, version, path = %path.display(), "stored package");
        Ok(path)
    }

    /// Remove one version, or every version of `name` when `version` is `None`.
    ///
    /// # Errors
    /// Returns `StoreIo` if a package tree or the index cannot be written.
    pub fn remove(&mut self, name: &str, version: Option<&str>) -> Result<bool, PkgError> {
        let prefix = format!("{name}@");
        let exact = version.map(|v| Self::package_key(name, v));

        let mut failure = None;
        let removed = self.update_index(|index| {
            let keys: Vec<String> = index
                .keys()
                .filter(|k| match &exact {
                    Some(e) => *k == e,
                    None => k.starts_with(&prefix),
                })
                .cloned()
                .collect();

            for key in &keys {
                if let Some(record) = index.remove(key) {
                    if let Err(e) = remove_path(&record.path) {
                        failure = Some(PkgError::store_io(format!(
                            "Failed to remove {}: {e}",
                            record.path.display()
                        )));
                    }
                }
            }
            !keys.is_empty()
        })?;

        if let Some(e) = failure {
            return Err(e);
        }

        // Drop the per-name directory once its last version is gone
        if removed && self.records_for(name).next().is_none() {
            let name_dir = self.root.join(sanitize(name));
            match fs::remove_dir(&name_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %name_dir.display(), error = %e, "failed to remove empty package directory");
                }
            }
        }

        Ok(removed)
    }

    /// Delete every stored package and reset the index.
    ///
    /// # Errors
    /// Returns `StoreIo` if the store contents cannot be removed.
    pub fn clear_cache(&mut self) -> Result<(), PkgError> {
        let _lock = self.lock_index()?;

        let entries = fs::read_dir(&self.root).map_err(|e| {
            PkgError::store_io(format!("Failed to read {}: {e}", self.root.display()))
        })?;
        for entry in entries.flatten() {
            if entry.file_name() == INDEX_LOCK_NAME {
                continue;
            }
            remove_path(&entry.path()).map_err(|e| {
                PkgError::store_io(format!("Failed to remove {}: {e}", entry.path().display()))
            })?;
        }

        self.index.clear();
        self.save_index()?;
        info!(root = %self.root.display(), "cleared global store");
        Ok(())
    }

    /// Compute store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let mut packages_by_vendor = BTreeMap::new();
        let mut total_size = 0;

        for record in self.index.values() {
            if record.path.is_dir() {
                total_size += dir_size(&record.path);
            }
            let vendor = record.name.split('/').next().unwrap_or_default();
            *packages_by_vendor.entry(vendor.to_string()).or_insert(0) += 1;
        }

        StoreStats {
            total_packages: self.index.len(),
            total_size,
            packages_by_vendor,
            store_path: self.root.clone(),
        }
    }

    /// Re-read the index under the lock, apply `mutate`, and persist if it reports a change.
    fn update_index<F>(&mut self, mutate: F) -> Result<bool, PkgError>
    where
        F: FnOnce(&mut StoreIndex) -> bool,
    {
        let _lock = self.lock_index()?;
        self.index = load_index(&self.index_path());
        let changed = mutate(&mut self.index);
        if changed {
            self.save_index()?;
        }
        Ok(changed)
    }

    fn lock_index(&self) -> Result<File, PkgError> {
        let path = self.root.join(INDEX_LOCK_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| PkgError::store_io(format!("Failed to open {}: {e}", path.display())))?;
        fs4::fs_std::FileExt::lock_exclusive(&file)
            .map_err(|e| PkgError::store_io(format!("Failed to lock {}: {e}", path.display())))?;
        Ok(file)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(STORE_INDEX_NAME)
    }

    fn save_index(&self) -> Result<(), PkgError> {
        let path = self.index_path();
        let content = serde_json::to_string_pretty(&self.index)
            .map_err(|e| PkgError::store_io(format!("Failed to serialize store index: {e}")))?;
        atomic_write(&path, content.as_bytes())
            .map_err(|e| PkgError::store_io(format!("Failed to write {}: {e}", path.display())))
    }
}

fn load_index(path: &Path) -> StoreIndex {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoreIndex::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "store index unreadable, starting empty");
            return StoreIndex::new();
        }
    };

    if content.trim().is_empty() || content.trim() == "[]" {
        return StoreIndex::new();
    }

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "store index corrupt, starting empty");
        StoreIndex::new()
    })
}

/// Make a package name or version safe as a single path component.
pub(crate) fn sanitize(part: &str) -> String {
    part.replace(['/', '\\'], "_")
}
