//! Symlink/junction creation for `vendor/`.

use super::error::PkgError;
use super::store::GlobalStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// What occupies a vendor path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Link,
    Directory,
}

/// One entry of the vendor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub kind: LinkKind,
    pub target: PathBuf,
    pub target_exists: bool,
}

/// Outcome of [`VendorLinker::repair_links`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Broken links that were recreated.
    pub repaired: Vec<String>,
    /// Broken links removed without replacement (no store record).
    pub removed: Vec<String>,
}

/// Links store packages into a project's vendor directory.
#[derive(Debug)]
pub struct VendorLinker<'a> {
    vendor_dir: PathBuf,
    store: &'a GlobalStore,
}

impl<'a> VendorLinker<'a> {
    #[must_use]
    pub fn new(vendor_dir: impl Into<PathBuf>, store: &'a GlobalStore) -> Self {
        Self {
            vendor_dir: vendor_dir.into(),
            store,
        }
    }

    #[must_use]
    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    /// `vendor/<vendor>/<name>` for a package name.
    ///
    /// # Errors
    /// Returns `LinkCreation` if the name is empty or would escape the vendor directory.
    pub fn vendor_path(&self, name: &str) -> Result<PathBuf, PkgError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(PkgError::link_failed(format!(
                "Invalid package name: {name}"
            )));
        }
        Ok(self.vendor_dir.join(relative))
    }

    /// Link every package, stopping at the first failure.
    ///
    /// A `Some` version pins the link to that store entry; `None` links the
    /// latest version in the store. Links created before a failure are kept.
    ///
    /// # Errors
    /// Returns the first `PackageNotFound`, `PackagePathMissing` or `LinkCreation` error.
    pub fn create_links(
        &self,
        packages: &BTreeMap<String, Option<String>>,
    ) -> Result<Vec<PathBuf>, PkgError> {
        fs::create_dir_all(&self.vendor_dir).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create {}: {e}",
                self.vendor_dir.display()
            ))
        })?;

        packages
            .iter()
            .map(|(name, version)| self.create_link(name, version.as_deref()))
            .collect()
    }

    /// Link one package, replacing whatever occupies its vendor path.
    ///
    /// # Errors
    /// Returns `PackageNotFound` if the store has no record, `PackagePathMissing`
    /// if the recorded directory is gone, or `LinkCreation` on filesystem failure.
    pub fn create_link(&self, name: &str, version: Option<&str>) -> Result<PathBuf, PkgError> {
        let record = self.store.record(name, version).ok_or_else(|| {
            PkgError::PackageNotFound(match version {
                Some(v) => format!("{name}@{v}"),
                None => name.to_string(),
            })
        })?;

        if !record.path.is_dir() {
            return Err(PkgError::PackagePathMissing(record.path.clone()));
        }

        let link_path = self.vendor_path(name)?;
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PkgError::link_failed(format!(
                    "Failed to create vendor directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // Remove existing link/directory if present
        if link_path.symlink_metadata().is_ok() {
            remove_link_or_dir(&link_path)?;
        }

        let target = fs::canonicalize(&record.path).unwrap_or_else(|_| record.path.clone());
        create_dir_link(&target, &link_path)?;
        debug!(package = name, version = %record.version, target = %target.display(), "linked");

        Ok(link_path)
    }

    /// Remove the vendor link or directory of `name`.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    /// Returns `LinkCreation` if the entry exists but cannot be removed.
    pub fn remove_package(&self, name: &str) -> Result<bool, PkgError> {
        let link_path = self.vendor_path(name)?;
        if link_path.symlink_metadata().is_err() {
            return Ok(false);
        }

        remove_link_or_dir(&link_path)?;
        // Drop the vendor namespace directory once its last package is gone
        if let Some(parent) = link_path.parent() {
            let empty = fs::read_dir(parent).is_ok_and(|mut entries| entries.next().is_none());
            if parent != self.vendor_dir && empty {
                if let Err(e) = fs::remove_dir(parent) {
                    warn!(path = %parent.display(), error = %e, "failed to remove empty vendor directory");
                }
            }
        }
        debug!(package = name, "unlinked");
        Ok(true)
    }

    /// Every package entry below the vendor directory.
    ///
    /// Entries are found two levels deep (`<vendor>/<name>`); a link directly
    /// under the vendor directory is reported under its own name.
    #[must_use]
    pub fn linked_packages(&self) -> BTreeMap<String, LinkInfo> {
        let mut found = BTreeMap::new();
        let Ok(top) = fs::read_dir(&self.vendor_dir) else {
            return found;
        };

        for entry in top.filter_map(Result::ok) {
            let namespace = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if is_link(&path) {
                found.insert(namespace, link_info(&path));
                continue;
            }
            if !path.is_dir() {
                continue;
            }

            let Ok(children) = fs::read_dir(&path) else {
                continue;
            };
            for child in children.filter_map(Result::ok) {
                let child_path = child.path();
                if is_link(&child_path) || child_path.is_dir() {
                    let name = format!("{namespace}/{}", child.file_name().to_string_lossy());
                    found.insert(name, link_info(&child_path));
                }
            }
        }

        found
    }

    /// True if `name` is a link whose target directory exists.
    #[must_use]
    pub fn is_linked(&self, name: &str) -> bool {
        self.link_target(name).is_some()
    }

    /// Target of the link for `name`, if it is a link to an existing directory.
    #[must_use]
    pub fn link_target(&self, name: &str) -> Option<PathBuf> {
        let path = self.vendor_path(name).ok()?;
        if !is_link(&path) {
            return None;
        }
        let target = fs::read_link(&path).ok()?;
        target.is_dir().then_some(target)
    }

    /// Recreate links whose target no longer exists.
    ///
    /// A version from `locked` is used when the store still has it; otherwise
    /// the latest stored version. Broken links with no store record are removed.
    ///
    /// # Errors
    /// Returns an error if a broken link cannot be removed or recreated.
    pub fn repair_links(&self, locked: &BTreeMap<String, String>) -> Result<RepairReport, PkgError> {
        let mut report = RepairReport::default();

        for (name, info) in self.linked_packages() {
            if info.kind != LinkKind::Link || info.target_exists {
                continue;
            }

            remove_link_or_dir(&self.vendor_path(&name)?)?;

            let pinned = locked
                .get(&name)
                .filter(|v| self.store.has_package(&name, v))
                .map(String::as_str);

            if pinned.is_none() && self.store.latest_version(&name).is_none() {
                info!(package = %name, "removed broken link with no store record");
                report.removed.push(name);
                continue;
            }

            self.create_link(&name, pinned)?;
            info!(package = %name, "repaired broken link");
            report.repaired.push(name);
        }

        Ok(report)
    }
}

fn link_info(path: &Path) -> LinkInfo {
    if is_link(path) {
        let target = fs::read_link(path).unwrap_or_default();
        LinkInfo {
            kind: LinkKind::Link,
            target_exists: target.is_dir(),
            target,
        }
    } else {
        LinkInfo {
            kind: LinkKind::Directory,
            target: path.to_path_buf(),
            target_exists: true,
        }
    }
}

fn is_link(path: &Path) -> bool {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return false;
    };

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        // FILE_ATTRIBUTE_REPARSE_POINT covers junctions as well as symlinks
        if metadata.file_attributes() & 0x400 != 0 {
            return true;
        }
    }

    metadata.file_type().is_symlink()
}

/// Remove a symlink, junction, or directory.
fn remove_link_or_dir(path: &Path) -> Result<(), PkgError> {
    #[cfg(unix)]
    {
        if is_link(path) {
            fs::remove_file(path).map_err(|e| {
                PkgError::link_failed(format!("Failed to remove existing symlink: {e}"))
            })?;
            return Ok(());
        }
    }

    #[cfg(windows)]
    {
        // Junctions are directories and must not be removed recursively
        if is_link(path) {
            fs::remove_dir(path)
                .or_else(|_| fs::remove_file(path))
                .map_err(|e| {
                    PkgError::link_failed(format!("Failed to remove existing junction: {e}"))
                })?;
            return Ok(());
        }
    }

    if path.is_dir() {
        fs::remove_dir_all(path).map_err(|e| {
            PkgError::link_failed(format!("Failed to remove existing directory: {e}"))
        })?;
    } else if path.symlink_metadata().is_ok() {
        fs::remove_file(path)
            .map_err(|e| PkgError::link_failed(format!("Failed to remove existing file: {e}")))?;
    }

    Ok(())
}

/// Create a directory link (symlink on Unix, junction on Windows).
fn create_dir_link(src: &Path, dst: &Path) -> Result<(), PkgError> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create symlink from {} to {}: {e}",
                dst.display(),
                src.display()
            ))
        })?;
    }

    #[cfg(windows)]
    {
        junction::create(src, dst).map_err(|e| {
            PkgError::link_failed(format!(
                "Failed to create junction from {} to {}: {e}",
                dst.display(),
                src.display()
            ))
        })?;
    }

    #[cfg(not(any(unix, windows)))]
    {
        pcomposer_util::fs::copy_dir_all(src, dst)
            .map_err(|e| PkgError::link_failed(format!("Failed to copy directory: {e}")))?;
    }

    Ok(())
}
