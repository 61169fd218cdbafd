//! Archive extraction.
//!
//! Registries serve zip archives; gzipped tarballs are accepted too. The
//! format is picked from the leading magic bytes, not the URL.

use super::error::PkgError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use zip::ZipArchive;

/// Supported archive containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

/// Detect the container format from the first bytes of the file.
///
/// # Errors
/// Returns `Archive` if the file cannot be read or the format is unknown.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, PkgError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)
        .map_err(|e| PkgError::archive(format!("Failed to open {}: {e}", path.display())))?;
    let n = file
        .read(&mut magic)
        .map_err(|e| PkgError::archive(format!("Failed to read {}: {e}", path.display())))?;

    match &magic[..n] {
        [b'P', b'K', 3, 4] | [b'P', b'K', 5, 6] => Ok(ArchiveFormat::Zip),
        [0x1f, 0x8b, ..] => Ok(ArchiveFormat::TarGz),
        _ => Err(PkgError::archive(format!(
            "Unrecognized archive format: {}",
            path.display()
        ))),
    }
}

/// Extract `archive` into `dest`, then flatten a single wrapping directory.
///
/// # Errors
/// Returns `Archive` if the archive is corrupt or an entry escapes `dest`.
pub fn extract(archive: &Path, dest: &Path) -> Result<(), PkgError> {
    fs::create_dir_all(dest).map_err(|e| {
        PkgError::archive(format!("Failed to create {}: {e}", dest.display()))
    })?;

    match detect_format(archive)? {
        ArchiveFormat::Zip => extract_zip(archive, dest)?,
        ArchiveFormat::TarGz => extract_tgz(archive, dest)?,
    }

    flatten_single_root(dest)
        .map_err(|e| PkgError::archive(format!("Failed to normalize layout: {e}")))?;
    Ok(())
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), PkgError> {
    let file = File::open(archive_path)
        .map_err(|e| PkgError::archive(format!("Failed to open archive: {e}")))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| PkgError::archive(format!("Failed to open zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PkgError::archive(format!("Failed to read zip entry: {e}")))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(PkgError::archive(format!(
                "Zip entry escapes destination: {}",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(extract_io)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(extract_io)?;
        }
        let mut out = File::create(&target).map_err(extract_io)?;
        io::copy(&mut entry, &mut out).map_err(extract_io)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777));
        }
    }

    Ok(())
}

fn extract_tgz(archive_path: &Path, dest: &Path) -> Result<(), PkgError> {
    let file = File::open(archive_path)
        .map_err(|e| PkgError::archive(format!("Failed to open archive: {e}")))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive
        .entries()
        .map_err(|e| PkgError::archive(format!("Failed to read tarball entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::archive(format!("Failed to read tarball entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| PkgError::archive(format!("Failed to read entry path: {e}")))?
            .into_owned();

        let target = safe_join(dest, &path)?;

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target).map_err(extract_io)?;
        } else if kind.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(extract_io)?;
            }
            let mut out = File::create(&target).map_err(extract_io)?;
            io::copy(&mut entry, &mut out).map_err(extract_io)?;

            #[cfg(unix)]
            if let Ok(mode) = entry.header().mode() {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777));
            }
        }
        // Links and special entries are skipped
    }

    Ok(())
}

/// Join an archive entry path onto `dest`, rejecting absolute and `..` paths.
fn safe_join(dest: &Path, entry: &Path) -> Result<PathBuf, PkgError> {
    let shown = entry.display();
    if entry.is_absolute() {
        return Err(PkgError::archive(format!(
            "Archive contains absolute path: {shown}"
        )));
    }
    if entry
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(PkgError::archive(format!(
            "Archive contains path traversal: {shown}"
        )));
    }
    Ok(dest.join(entry))
}

fn extract_io(e: io::Error) -> PkgError {
    PkgError::archive(format!("Failed to write extracted file: {e}"))
}

/// If `dir` holds exactly one subdirectory and no files, move that
/// subdirectory's contents up into `dir`.
///
/// Returns whether the layout was flattened.
///
/// # Errors
/// Returns an error if the directory cannot be read or entries cannot be moved.
pub fn flatten_single_root(dir: &Path) -> io::Result<bool> {
    let mut dirs = Vec::new();
    let mut files = 0usize;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            files += 1;
        }
    }

    if files != 0 || dirs.len() != 1 {
        return Ok(false);
    }

    let wrapper = dirs.remove(0);
    // Rename the wrapper first so a child with the same name cannot collide
    let staging = dir.join(format!(".flatten-{}", std::process::id()));
    fs::rename(&wrapper, &staging)?;

    for entry in fs::read_dir(&staging)? {
        let entry = entry?;
        fs::rename(entry.path(), dir.join(entry.file_name()))?;
    }
    fs::remove_dir(&staging)?;

    Ok(true)
}
