//! Lockfile for reproducible installs.
//!
//! ## File Format
//!
//! The lockfile is a JSON file named `pcomposer.lock` at the project root:
//!
//! ```json
//! {
//!   "packages": {
//!     "monolog/monolog": {
//!       "name": "monolog/monolog",
//!       "version": "3.5.0",
//!       "dependencies": { "psr/log": "^2.0 || ^3.0" },
//!       "locked_at": "2024-05-01 10:00:00"
//!     }
//!   },
//!   "packages-dev": {},
//!   "minimum-stability": "stable",
//!   "generated": "2024-05-01 10:00:00"
//! }
//! ```
//!
//! Top-level keys other than `packages`, `packages-dev` and `generated` are
//! carried through untouched.

use super::error::PkgError;
use super::manifest::to_pretty_json;
use super::store::{map_or_empty_list, timestamp_now};
use crate::paths::LOCKFILE_NAME;
use pcomposer_util::fs::atomic_write;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One locked package.
///
/// Entries written by [`LockFile::update_from_manifest`] carry only the
/// constraint; [`LockFile::lock_package`] replaces them with a resolved version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_dependencies"
    )]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub locked_at: String,
}

impl LockEntry {
    /// Whether this entry still waits for a resolved version.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.version.is_none()
    }
}

fn optional_dependencies<'de, D>(de: D) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    map_or_empty_list(de).map(Some)
}

fn entry_map<'de, D>(de: D) -> Result<BTreeMap<String, LockEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList {
        Map(BTreeMap<String, LockEntry>),
        List(Vec<serde_json::Value>),
    }

    match Option::<MapOrList>::deserialize(de)? {
        Some(MapOrList::Map(m)) => Ok(m),
        Some(MapOrList::List(l)) if l.is_empty() => Ok(BTreeMap::new()),
        Some(MapOrList::List(_)) => Err(serde::de::Error::custom(
            "expected an object of package name -> entry",
        )),
        None => Ok(BTreeMap::new()),
    }
}

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockData {
    #[serde(default, deserialize_with = "entry_map")]
    pub packages: BTreeMap<String, LockEntry>,
    #[serde(rename = "packages-dev", default, deserialize_with = "entry_map")]
    pub packages_dev: BTreeMap<String, LockEntry>,
    /// Compatibility fields (`minimum-stability`, `platform`, ...), carried through.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

impl Default for LockData {
    fn default() -> Self {
        use serde_json::{Map, Value};

        let extra: Map<String, Value> = [
            ("platform", Value::Object(Map::new())),
            ("platform-dev", Value::Object(Map::new())),
            ("aliases", Value::Array(Vec::new())),
            ("minimum-stability", Value::from("stable")),
            ("stability-flags", Value::Object(Map::new())),
            ("prefer-stable", Value::Bool(false)),
            ("prefer-lowest", Value::Bool(false)),
            ("platform-references", Value::Object(Map::new())),
            ("plugin-api-version", Value::from("2.0.0")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            packages: BTreeMap::new(),
            packages_dev: BTreeMap::new(),
            extra,
            generated: Some(timestamp_now()),
        }
    }
}

/// A project's lockfile.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    data: LockData,
}

impl LockFile {
    /// Load the lockfile of the project at `project_root`.
    ///
    /// A missing file yields an empty skeleton.
    ///
    /// # Errors
    /// Returns `CorruptLockFile` if the file exists but is not valid JSON.
    pub fn load(project_root: &Path) -> Result<Self, PkgError> {
        let path = project_root.join(LOCKFILE_NAME);

        let data = match fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| PkgError::CorruptLockFile {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => LockData::default(),
            Err(e) => {
                return Err(PkgError::CorruptLockFile {
                    path,
                    message: format!("unreadable: {e}"),
                })
            }
        };

        Ok(Self { path, data })
    }

    /// An empty skeleton for the project at `project_root`, ignoring any file on disk.
    #[must_use]
    pub fn empty(project_root: &Path) -> Self {
        Self {
            path: project_root.join(LOCKFILE_NAME),
            data: LockData::default(),
        }
    }

    /// Path of the lockfile.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lockfile exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// The persisted document.
    #[must_use]
    pub fn data(&self) -> &LockData {
        &self.data
    }

    /// Timestamp of the last save.
    #[must_use]
    pub fn generated(&self) -> Option<&str> {
        self.data.generated.as_deref()
    }

    /// Production and development entries merged; development wins on duplicates.
    #[must_use]
    pub fn locked_packages(&self) -> BTreeMap<String, LockEntry> {
        let mut merged = self.data.packages.clone();
        merged.extend(
            self.data
                .packages_dev
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    /// Resolved version locked for `name`.
    #[must_use]
    pub fn locked_version(&self, name: &str) -> Option<String> {
        self.data
            .packages_dev
            .get(name)
            .or_else(|| self.data.packages.get(name))
            .and_then(|e| e.version.clone())
    }

    /// Whether `name` has a resolved version.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.locked_version(name).is_some()
    }

    /// Entries that still carry only a constraint.
    #[must_use]
    pub fn outdated(&self) -> Vec<LockEntry> {
        self.locked_packages()
            .into_values()
            .filter(|e| e.constraint.is_some())
            .collect()
    }

    /// True iff the manifest's package names equal the locked package names.
    ///
    /// Versions are not compared.
    #[must_use]
    pub fn is_up_to_date(
        &self,
        require: &BTreeMap<String, String>,
        require_dev: &BTreeMap<String, String>,
    ) -> bool {
        let wanted: BTreeSet<&String> = require.keys().chain(require_dev.keys()).collect();
        let locked: BTreeSet<&String> = self
            .data
            .packages
            .keys()
            .chain(self.data.packages_dev.keys())
            .collect();
        wanted == locked
    }

    /// Replace every entry with a constraint-only placeholder and save.
    ///
    /// # Errors
    /// Returns `LockFileIo` if the file cannot be written.
    pub fn update_from_manifest(
        &mut self,
        require: &BTreeMap<String, String>,
        require_dev: &BTreeMap<String, String>,
    ) -> Result<(), PkgError> {
        let now = timestamp_now();
        let placeholders = |deps: &BTreeMap<String, String>| {
            deps.iter()
                .map(|(name, constraint)| {
                    (
                        name.clone(),
                        LockEntry {
                            name: name.clone(),
                            version: None,
                            constraint: Some(constraint.clone()),
                            dependencies: None,
                            locked_at: now.clone(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>()
        };

        self.data.packages = placeholders(require);
        self.data.packages_dev = placeholders(require_dev);
        self.save()
    }

    /// Upsert the resolved entry for `name` and save.
    ///
    /// # Errors
    /// Returns `LockFileIo` if the file cannot be written.
    pub fn lock_package(
        &mut self,
        name: &str,
        version: &str,
        dependencies: BTreeMap<String, String>,
        dev: bool,
    ) -> Result<(), PkgError> {
        let section = if dev {
            &mut self.data.packages_dev
        } else {
            &mut self.data.packages
        };
        section.insert(
            name.to_string(),
            LockEntry {
                name: name.to_string(),
                version: Some(version.to_string()),
                constraint: None,
                dependencies: Some(dependencies),
                locked_at: timestamp_now(),
            },
        );
        debug!(package = name, version, dev, "locked");
        self.save()
    }

    /// Drop `name` from both sections and save.
    ///
    /// # Errors
    /// Returns `LockFileIo` if the file cannot be written.
    pub fn unlock_package(&mut self, name: &str) -> Result<bool, PkgError> {
        let a = self.data.packages.remove(name).is_some();
        let b = self.data.packages_dev.remove(name).is_some();
        self.save()?;
        Ok(a || b)
    }

    /// Delete the lockfile, resetting to an empty skeleton.
    ///
    /// Returns whether a file was removed.
    ///
    /// # Errors
    /// Returns `LockFileIo` if the file exists but cannot be removed.
    pub fn delete(&mut self) -> Result<bool, PkgError> {
        self.data = LockData::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(PkgError::LockFileIo {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&mut self) -> Result<(), PkgError> {
        self.data.generated = Some(timestamp_now());
        let content = to_pretty_json(&self.data).map_err(|e| PkgError::LockFileIo {
            path: self.path.clone(),
            source: io::Error::other(e),
        })?;
        atomic_write(&self.path, &content).map_err(|source| PkgError::LockFileIo {
            path: self.path.clone(),
            source,
        })
    }
}
