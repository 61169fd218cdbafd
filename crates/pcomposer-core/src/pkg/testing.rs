//! In-memory registry double shared by the unit tests.

use super::error::PkgError;
use super::registry::{PackageMetadata, Registry, Release};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Registry serving zip archives built in memory, counting every call.
#[derive(Debug, Default)]
pub(crate) struct FakeRegistry {
    packages: BTreeMap<String, PackageMetadata>,
    archives: BTreeMap<String, Vec<u8>>,
    pub metadata_calls: Cell<usize>,
    pub downloads: Cell<usize>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `name@version` whose `composer.json` requires `require`.
    pub fn with_package(mut self, name: &str, version: &str, require: &[(&str, &str)]) -> Self {
        let url = format!("fake://{name}/{version}.zip");
        let require_map: BTreeMap<String, String> = require
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        let composer = serde_json::json!({
            "name": name,
            "version": version,
            "require": require_map,
            "autoload": { "psr-4": { "Fake\\": "src/" } }
        });
        let wrapper = format!("{}-{version}", name.replace('/', "-"));
        let zip = build_zip(&[
            (format!("{wrapper}/composer.json"), composer.to_string()),
            (format!("{wrapper}/src/Lib.php"), format!("<?php // {name} {version}")),
        ]);
        self.archives.insert(url.clone(), zip);

        self.packages
            .entry(name.to_string())
            .or_insert_with(|| PackageMetadata {
                name: name.to_string(),
                releases: Vec::new(),
            })
            .releases
            .push(Release {
                version: version.to_string(),
                dist_url: Some(url),
                require: require_map,
            });
        self
    }

    pub fn calls(&self) -> (usize, usize) {
        (self.metadata_calls.get(), self.downloads.get())
    }
}

impl Registry for FakeRegistry {
    fn fetch_metadata(&self, name: &str) -> Result<PackageMetadata, PkgError> {
        self.metadata_calls.set(self.metadata_calls.get() + 1);
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| PkgError::registry(format!("Package not found in registry: {name}")))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<(), PkgError> {
        self.downloads.set(self.downloads.get() + 1);
        let bytes = self
            .archives
            .get(url)
            .ok_or_else(|| PkgError::archive(format!("Download failed for '{url}'")))?;
        fs::write(dest, bytes).map_err(|e| PkgError::archive(e.to_string()))
    }
}

pub(crate) fn build_zip(files: &[(String, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in files {
        zip.start_file(name.as_str(), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
