//! Project manifest (`composer.json`) reading and editing.
//!
//! The document is held as an ordered JSON object so that rewriting
//! `require`/`require-dev` leaves every other key where it was.

use super::error::PkgError;
use super::registry::string_map;
use crate::paths::MANIFEST_NAME;
use pcomposer_util::fs::atomic_write;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Constraint written by `require` when none is given.
pub const DEFAULT_CONSTRAINT: &str = "*";

const REQUIRE: &str = "require";
const REQUIRE_DEV: &str = "require-dev";

/// Serialize with four-space indentation, as composer writes its files.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    out.push(b'\n');
    Ok(out)
}

/// A project's `composer.json`.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    data: Map<String, Value>,
    exists: bool,
}

impl Manifest {
    /// Load the manifest of the project at `project_root`.
    ///
    /// A missing file yields an empty project skeleton that is written out on
    /// the first edit.
    ///
    /// # Errors
    /// Returns `CorruptManifest` if the file is not a JSON object.
    pub fn load(project_root: &Path) -> Result<Self, PkgError> {
        let path = project_root.join(MANIFEST_NAME);

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    data: skeleton(),
                    exists: false,
                })
            }
            Err(e) => {
                return Err(PkgError::CorruptManifest {
                    path,
                    message: format!("unreadable: {e}"),
                })
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(data)) => Ok(Self {
                path,
                data,
                exists: true,
            }),
            Ok(_) => Err(PkgError::CorruptManifest {
                path,
                message: "expected a JSON object".to_string(),
            }),
            Err(e) => Err(PkgError::CorruptManifest {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Load the manifest, failing when the file does not exist.
    ///
    /// # Errors
    /// Returns `ManifestMissing` or `CorruptManifest`.
    pub fn load_required(project_root: &Path) -> Result<Self, PkgError> {
        let manifest = Self::load(project_root)?;
        if !manifest.exists {
            return Err(PkgError::ManifestMissing(project_root.to_path_buf()));
        }
        Ok(manifest)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// The `name` field, defaulting to `project/root`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.data
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("project/root")
    }

    /// Production dependencies.
    #[must_use]
    pub fn require(&self) -> BTreeMap<String, String> {
        string_map(self.data.get(REQUIRE))
    }

    /// Development dependencies.
    #[must_use]
    pub fn require_dev(&self) -> BTreeMap<String, String> {
        string_map(self.data.get(REQUIRE_DEV))
    }

    /// Production and development dependencies; development wins on duplicates.
    #[must_use]
    pub fn dependencies(&self) -> BTreeMap<String, String> {
        let mut all = self.require();
        all.extend(self.require_dev());
        all
    }

    #[must_use]
    pub fn is_dev(&self, name: &str) -> bool {
        self.section(REQUIRE_DEV)
            .is_some_and(|deps| deps.contains_key(name))
    }

    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies().contains_key(name)
    }

    /// The project's `autoload` section, if it is an object.
    #[must_use]
    pub fn autoload(&self) -> Option<&Map<String, Value>> {
        self.data.get("autoload").and_then(Value::as_object)
    }

    /// Add or overwrite a dependency and save.
    ///
    /// The section is kept sorted by package name.
    ///
    /// # Errors
    /// Returns `ManifestIo` if the file cannot be written.
    pub fn add_dependency(
        &mut self,
        name: &str,
        constraint: Option<&str>,
        dev: bool,
    ) -> Result<(), PkgError> {
        let key = if dev { REQUIRE_DEV } else { REQUIRE };
        let constraint = constraint
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CONSTRAINT);

        let mut entries: BTreeMap<String, Value> = self
            .section(key)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        entries.insert(name.to_string(), Value::String(constraint.to_string()));

        self.data
            .insert(key.to_string(), Value::Object(entries.into_iter().collect()));
        self.save()
    }

    /// Remove `name` from both sections, saving only when something changed.
    ///
    /// # Errors
    /// Returns `ManifestIo` if the file cannot be written.
    pub fn remove_dependency(&mut self, name: &str) -> Result<bool, PkgError> {
        let mut removed = false;
        for key in [REQUIRE, REQUIRE_DEV] {
            if let Some(Value::Object(deps)) = self.data.get_mut(key) {
                removed |= deps.shift_remove(name).is_some();
            }
        }

        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Write the manifest back to disk.
    ///
    /// # Errors
    /// Returns `ManifestIo` if the file cannot be written.
    pub fn save(&mut self) -> Result<(), PkgError> {
        let bytes = to_pretty_json(&self.data).map_err(|e| PkgError::ManifestIo {
            path: self.path.clone(),
            source: io::Error::other(e),
        })?;
        atomic_write(&self.path, &bytes).map_err(|source| PkgError::ManifestIo {
            path: self.path.clone(),
            source,
        })?;
        self.exists = true;
        Ok(())
    }

    /// Problems with the manifest's structure; empty when it is valid.
    ///
    /// Checks that `name` is present and has the `vendor/package` form, and
    /// that the dependency and autoload sections are objects.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.data.get("name") {
            None => errors.push("Missing 'name' field".to_string()),
            Some(Value::String(name)) if is_valid_package_name(name) => {}
            Some(_) => errors.push("Invalid package name format".to_string()),
        }

        for key in [REQUIRE, REQUIRE_DEV, "autoload", "autoload-dev"] {
            // An empty list is how PHP encodes an empty object
            let ok = match self.data.get(key) {
                None | Some(Value::Object(_)) => true,
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            };
            if !ok {
                errors.push(format!("Invalid '{key}' section"));
            }
        }

        errors
    }

    fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.data.get(key).and_then(Value::as_object)
    }
}

/// Lowercase `vendor/package`, each part alphanumeric runs joined by single `_`, `.` or `-`.
fn is_valid_package_name(name: &str) -> bool {
    regex_lite::Regex::new(r"^[a-z0-9]([_.-]?[a-z0-9]+)*/[a-z0-9]([_.-]?[a-z0-9]+)*$")
        .is_ok_and(|re| re.is_match(name))
}

fn skeleton() -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("name".into(), "project/root".into());
    data.insert("description".into(), "Project managed by pcomposer".into());
    data.insert("type".into(), "project".into());
    for key in [REQUIRE, REQUIRE_DEV, "autoload", "autoload-dev"] {
        data.insert(key.into(), Value::Object(Map::new()));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, json: &str) {
        fs::write(dir.join(MANIFEST_NAME), json).unwrap();
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(!manifest.exists());
        assert_eq!(manifest.name(), "project/root");
        assert!(manifest.dependencies().is_empty());

        assert!(matches!(
            Manifest::load_required(dir.path()),
            Err(PkgError::ManifestMissing(_))
        ));
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = tempdir().unwrap();
        write(dir.path(), "{ nope");
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(PkgError::CorruptManifest { .. })
        ));

        write(dir.path(), "[1, 2]");
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(PkgError::CorruptManifest { .. })
        ));
    }

    #[test]
    fn test_dependencies_dev_wins() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            r#"{"require": {"php": ">=8.1", "acme/a": "^1.0"}, "require-dev": {"acme/a": "^2.0", "acme/test": "*"}}"#,
        );

        let manifest = Manifest::load(dir.path()).unwrap();
        let all = manifest.dependencies();
        assert_eq!(all["acme/a"], "^2.0");
        assert_eq!(all.len(), 3);
        assert!(manifest.is_dev("acme/test"));
        assert!(!manifest.is_dev("php"));
    }

    #[test]
    fn test_php_empty_arrays() {
        let dir = tempdir().unwrap();
        write(dir.path(), r#"{"require": [], "require-dev": []}"#);

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.dependencies().is_empty());
    }

    #[test]
    fn test_add_dependency_sorts_and_preserves_keys() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            r#"{"name": "acme/app", "require": {"zeta/z": "^1.0"}, "extra": {"keep": true}}"#,
        );

        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.add_dependency("alpha/a", None, false).unwrap();
        manifest.add_dependency("acme/dev", Some("^3.0"), true).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(manifest.path()).unwrap()).unwrap();
        let keys: Vec<&String> = raw["require"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["alpha/a", "zeta/z"]);
        assert_eq!(raw["require"]["alpha/a"], DEFAULT_CONSTRAINT);
        assert_eq!(raw["require-dev"]["acme/dev"], "^3.0");
        assert_eq!(raw["extra"]["keep"], true);
        assert_eq!(raw["name"], "acme/app");

        let top: Vec<&String> = raw.as_object().unwrap().keys().collect();
        assert_eq!(top, ["name", "require", "extra", "require-dev"]);
    }

    #[test]
    fn test_add_dependency_creates_file() {
        let dir = tempdir().unwrap();

        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.add_dependency("acme/a", Some("^1.0"), false).unwrap();

        assert!(manifest.exists());
        let reloaded = Manifest::load_required(dir.path()).unwrap();
        assert_eq!(reloaded.require()["acme/a"], "^1.0");
        assert_eq!(reloaded.name(), "project/root");
    }

    #[test]
    fn test_remove_dependency() {
        let dir = tempdir().unwrap();
        let original = r#"{"require": {"acme/a": "^1.0", "acme/b": "^1.0"}, "require-dev": {"acme/a": "*"}}"#;
        write(dir.path(), original);

        let mut manifest = Manifest::load(dir.path()).unwrap();
        assert!(!manifest.remove_dependency("acme/missing").unwrap());
        assert_eq!(fs::read_to_string(manifest.path()).unwrap(), original);

        assert!(manifest.remove_dependency("acme/a").unwrap());
        let reloaded = Manifest::load(dir.path()).unwrap();
        assert!(!reloaded.has_dependency("acme/a"));
        assert!(reloaded.has_dependency("acme/b"));
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let bytes = to_pretty_json(&serde_json::json!({"a": {"b": 1}})).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\n    \"a\": {\n        \"b\": 1\n    }\n}\n"
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_manifest() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            r#"{"name": "acme/my-app.core", "require": {"psr/log": "^3.0"}, "require-dev": [], "autoload": {"psr-4": {"Acme\\": "src/"}}}"#,
        );

        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.validate().is_empty(), "{:?}", manifest.validate());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            r#"{"require": "psr/log", "autoload-dev": 3}"#,
        );
        let errors = Manifest::load(dir.path()).unwrap().validate();
        assert_eq!(
            errors,
            vec![
                "Missing 'name' field".to_string(),
                "Invalid 'require' section".to_string(),
                "Invalid 'autoload-dev' section".to_string(),
            ]
        );

        for bad in ["Acme/App", "acme", "acme/app/extra", "acme/-app", "acme/a--b"] {
            write(dir.path(), &format!(r#"{{"name": "{bad}"}}"#));
            let errors = Manifest::load(dir.path()).unwrap().validate();
            assert_eq!(errors, vec!["Invalid package name format".to_string()], "{bad}");
        }
    }

    #[test]
    fn test_validate_skeleton_is_valid() {
        let dir = tempdir().unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        assert!(manifest.validate().is_empty());
    }
}
