//! `vendor/autoload.php` generation.
//!
//! Packages are loaded straight from their store paths; the project's own
//! `autoload` section is resolved relative to the vendor directory.

use super::error::PkgError;
use crate::paths::MANIFEST_NAME;
use pcomposer_util::fs::atomic_write;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Generated file name inside the vendor directory.
pub const AUTOLOAD_FILE: &str = "autoload.php";

const HEADER: &str = "<?php\n\n// pcomposer autoloader\n// Generated automatically by pcomposer, do not edit\n\n";

/// Where loader paths are rooted.
#[derive(Debug, Clone, Copy)]
enum Base<'a> {
    /// Absolute store directory of a package.
    Package(&'a Path),
    /// The project root, reached from `vendor/` via `__DIR__ . '/../'`.
    Project(&'a Path),
}

impl Base<'_> {
    /// PHP expression for `relative` under this base.
    fn expr(self, relative: &str) -> String {
        let relative = relative.trim_start_matches("./");
        match self {
            Base::Package(root) => {
                let root = root.to_string_lossy();
                let root = root.trim_end_matches(['/', '\\']);
                if relative.is_empty() {
                    format!("'{}/'", php_escape(root))
                } else {
                    format!("'{}/{}'", php_escape(root), php_escape(relative))
                }
            }
            Base::Project(_) => format!("__DIR__ . '/../{}'", php_escape(relative)),
        }
    }

    fn fs_path(self, relative: &str) -> PathBuf {
        match self {
            Base::Package(root) | Base::Project(root) => root.join(relative),
        }
    }
}

/// Escape text for a single-quoted PHP string.
fn php_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Read the `autoload` section of the package stored at `package_dir`.
#[must_use]
pub fn package_autoload(package_dir: &Path) -> Option<Map<String, Value>> {
    let path = package_dir.join(MANIFEST_NAME);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Value>(&content) {
        Ok(mut doc) => match doc.get_mut("autoload").map(Value::take) {
            Some(Value::Object(autoload)) => Some(autoload),
            _ => None,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable package manifest");
            None
        }
    }
}

/// Render the autoloader.
///
/// `packages` pairs each package name with its store directory; the project's
/// section comes last.
#[must_use]
pub fn generate(
    packages: &[(String, PathBuf)],
    project_root: &Path,
    project_autoload: Option<&Map<String, Value>>,
) -> String {
    let mut out = String::from(HEADER);

    for (name, dir) in packages {
        let Some(autoload) = package_autoload(dir) else {
            continue;
        };
        if autoload.is_empty() {
            continue;
        }
        out.push_str(&format!("// Autoloader for {name}\n"));
        render_section(&mut out, &autoload, Base::Package(dir));
    }

    if let Some(autoload) = project_autoload.filter(|a| !a.is_empty()) {
        out.push_str("\n// Project autoload configuration\n");
        render_section(&mut out, autoload, Base::Project(project_root));
    }

    out
}

/// Write `content` to `<vendor_dir>/autoload.php`.
///
/// # Errors
/// Returns `VendorIo` if the file cannot be written.
pub fn dump(vendor_dir: &Path, content: &str) -> Result<PathBuf, PkgError> {
    let path = vendor_dir.join(AUTOLOAD_FILE);
    atomic_write(&path, content.as_bytes()).map_err(|source| PkgError::VendorIo {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "wrote autoloader");
    Ok(path)
}

fn render_section(out: &mut String, autoload: &Map<String, Value>, base: Base<'_>) {
    for (kind, config) in autoload {
        match kind.as_str() {
            "psr-4" => render_prefixes(out, config, base, true),
            "psr-0" => render_prefixes(out, config, base, false),
            "classmap" => render_requires(out, config, base, true),
            "files" => render_requires(out, config, base, false),
            other => debug!(kind = other, "skipping unsupported autoload type"),
        }
    }
}

/// One `spl_autoload_register` closure per (prefix, directory).
///
/// PSR-4 strips the prefix from the class name; PSR-0 maps the full name.
fn render_prefixes(out: &mut String, config: &Value, base: Base<'_>, psr4: bool) {
    let Some(mapping) = config.as_object() else {
        return;
    };

    for (prefix, dirs) in mapping {
        for dir in string_list(dirs) {
            let dir = if dir.is_empty() || dir.ends_with('/') {
                dir.to_string()
            } else {
                format!("{dir}/")
            };
            let class_path = if psr4 { "$relative_class" } else { "$class" };

            out.push_str("spl_autoload_register(function ($class) {\n");
            out.push_str(&format!("    $prefix = '{}';\n", php_escape(prefix)));
            out.push_str(&format!("    $base_dir = {};\n", base.expr(&dir)));
            out.push_str("    $len = strlen($prefix);\n");
            out.push_str("    if (strncmp($prefix, $class, $len) !== 0) {\n");
            out.push_str("        return;\n");
            out.push_str("    }\n");
            out.push_str("    $relative_class = substr($class, $len);\n");
            out.push_str(&format!(
                "    $file = $base_dir . str_replace('\\\\', '/', {class_path}) . '.php';\n"
            ));
            out.push_str("    if (file_exists($file)) {\n");
            out.push_str("        require $file;\n");
            out.push_str("    }\n");
            out.push_str("});\n\n");
        }
    }
}

/// `require_once` per listed file; directory classmaps are skipped.
fn render_requires(out: &mut String, config: &Value, base: Base<'_>, skip_dirs: bool) {
    let files = string_list(config);
    if files.is_empty() {
        return;
    }

    for file in files {
        if skip_dirs && base.fs_path(file).is_dir() {
            continue;
        }
        out.push_str(&format!("require_once {};\n", base.expr(file)));
    }
    out.push('\n');
}

/// A string or an array of strings.
fn string_list(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn package(dir: &Path, autoload: &Value) -> PathBuf {
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::create_dir_all(dir.join("classes")).unwrap();
        fs::write(
            dir.join(MANIFEST_NAME),
            serde_json::json!({ "name": "acme/log", "autoload": autoload }).to_string(),
        )
        .unwrap();
        dir.to_path_buf()
    }

    #[test]
    fn test_package_psr4_loader() {
        let root = tempdir().unwrap();
        let pkg = package(
            &root.path().join("acme_log"),
            &serde_json::json!({ "psr-4": { "Acme\\Log\\": "src/" } }),
        );

        let php = generate(
            &[("acme/log".to_string(), pkg.clone())],
            root.path(),
            None,
        );

        assert!(php.starts_with("<?php\n"));
        assert!(php.contains("// Autoloader for acme/log\n"));
        assert!(php.contains("    $prefix = 'Acme\\\\Log\\\\';\n"));
        assert!(php.contains(&format!(
            "    $base_dir = '{}/src/';\n",
            pkg.to_string_lossy()
        )));
        assert!(php.contains("str_replace('\\\\', '/', $relative_class)"));
        assert!(!php.contains("Project autoload configuration"));
    }

    #[test]
    fn test_package_requires_skip_directories() {
        let root = tempdir().unwrap();
        let pkg = package(
            &root.path().join("acme_log"),
            &serde_json::json!({
                "classmap": ["classes", "Legacy.php"],
                "files": "helpers.php"
            }),
        );

        let php = generate(&[("acme/log".to_string(), pkg.clone())], root.path(), None);
        let base = pkg.to_string_lossy();

        assert!(php.contains(&format!("require_once '{base}/Legacy.php';\n")));
        assert!(php.contains(&format!("require_once '{base}/helpers.php';\n")));
        assert!(!php.contains(&format!("'{base}/classes'")));
    }

    #[test]
    fn test_packages_without_autoload_are_skipped() {
        let root = tempdir().unwrap();
        let bare = root.path().join("bare");
        fs::create_dir_all(&bare).unwrap();
        fs::write(bare.join(MANIFEST_NAME), r#"{"name": "acme/bare"}"#).unwrap();
        let broken = root.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join(MANIFEST_NAME), "{").unwrap();

        let php = generate(
            &[
                ("acme/bare".to_string(), bare),
                ("acme/broken".to_string(), broken),
            ],
            root.path(),
            None,
        );

        assert_eq!(php, HEADER);
    }

    #[test]
    fn test_project_section() {
        let root = tempdir().unwrap();
        let autoload = serde_json::json!({
            "psr-4": { "App\\": ["src/", "lib"] },
            "psr-0": { "Legacy_": "old/" },
            "files": ["bootstrap.php"]
        });

        let php = generate(&[], root.path(), autoload.as_object());

        assert!(php.contains("\n// Project autoload configuration\n"));
        assert!(php.contains("    $base_dir = __DIR__ . '/../src/';\n"));
        assert!(php.contains("    $base_dir = __DIR__ . '/../lib/';\n"));
        assert!(php.contains("str_replace('\\\\', '/', $class)"));
        assert!(php.contains("require_once __DIR__ . '/../bootstrap.php';\n"));
    }

    #[test]
    fn test_escapes_quotes() {
        assert_eq!(php_escape("it's\\here"), "it\\'s\\\\here");
    }

    #[test]
    fn test_dump_creates_vendor_dir() {
        let root = tempdir().unwrap();
        let vendor = root.path().join("vendor");

        let path = dump(&vendor, HEADER).unwrap();

        assert_eq!(path, vendor.join(AUTOLOAD_FILE));
        assert_eq!(fs::read_to_string(path).unwrap(), HEADER);
    }
}
