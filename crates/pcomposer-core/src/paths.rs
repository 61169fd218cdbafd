use std::path::{Path, PathBuf};

/// Project manifest filename.
pub const MANIFEST_NAME: &str = "composer.json";

/// Lockfile filename.
pub const LOCKFILE_NAME: &str = "pcomposer.lock";

/// Vendor directory name, relative to the project root.
pub const VENDOR_DIR: &str = "vendor";

/// Store index filename, relative to the store root.
pub const STORE_INDEX_NAME: &str = "metadata.json";

/// Find the project root by walking up from `cwd` looking for `composer.json`.
///
/// Falls back to `cwd` itself when no ancestor has a manifest.
#[must_use]
pub fn project_root(cwd: &Path) -> PathBuf {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(MANIFEST_NAME).is_file() {
            return current;
        }

        if !current.pop() {
            return cwd.to_path_buf();
        }
    }
}

/// Get the default global store directory.
///
/// `~/.pcomposer/store`, or `<tmp>/.pcomposer/store` when no home directory
/// can be resolved.
#[must_use]
pub fn default_store_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".pcomposer")
        .join("store")
}

/// Resolve the store directory, honouring an explicit override.
#[must_use]
pub fn store_dir(override_dir: Option<&Path>) -> PathBuf {
    override_dir.map_or_else(default_store_dir, Path::to_path_buf)
}
