//! Archive extraction into per-bundle working directories

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{NeoError, Result};

/// A bundle extracted to disk
///
/// Files beneath `directory_path` are kept for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBundle {
    pub directory_path: PathBuf,
}

/// Directory a given archive extracts into: `<work_root>/<name up to the first '.'>`
pub fn bundle_dir(archive: &Path, work_root: &Path) -> PathBuf {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();
    work_root.join(base)
}

/// Extract every entry of a zip archive into its bundle directory
///
/// Unreadable archives, entries that would escape the target directory and
/// an uncreatable target are all reported as [`NeoError::CorruptArchive`].
pub fn unpack(archive: &Path, work_root: &Path) -> Result<ExtractedBundle> {
    let corrupt = |reason: String| NeoError::CorruptArchive {
        path: archive.to_path_buf(),
        reason,
    };

    let directory_path = bundle_dir(archive, work_root);
    if directory_path == work_root {
        return Err(corrupt("archive has no usable base name".to_string()));
    }

    let file = File::open(archive).map_err(|e| corrupt(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    fs::create_dir_all(&directory_path)
        .map_err(|e| corrupt(format!("cannot create {:?}: {}", directory_path, e)))?;
    zip.extract(&directory_path)
        .map_err(|e| corrupt(e.to_string()))?;

    log::info!(
        "Extracted {} entries from {:?} into {:?}",
        zip.len(),
        archive.file_name().unwrap_or_default(),
        directory_path
    );

    Ok(ExtractedBundle { directory_path })
}
