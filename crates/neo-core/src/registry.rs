//! Voice model catalog
//!
//! Extracted bundles are scanned for RVC weight (`.pth`) and retrieval index
//! (`.index`) files. Each scanned bundle yields one catalog entry keyed by
//! model name. The registry is an explicit object shared by handle; there is
//! no global catalog.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{NeoError, Result};

/// Extension of model weight artifacts
pub const WEIGHT_EXTENSION: &str = "pth";
/// Extension of retrieval index artifacts
pub const INDEX_EXTENSION: &str = "index";

/// A registered voice model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalogEntry {
    pub model_name: String,
    pub weight_file_path: PathBuf,
    pub index_file_path: Option<PathBuf>,
}

/// True when `path` has the weight extension
pub fn is_weight_file(path: &Path) -> bool {
    has_extension(path, WEIGHT_EXTENSION)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Name used when the caller did not choose one: the weight file's stem
fn derived_name(weight: &Path) -> String {
    weight
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Walk `directory` and pick the bundle's weight and index files
///
/// The walk is sorted by file name so the choice is stable. When several
/// weight files exist only the first one is used.
pub fn scan_bundle(directory: &Path, name: &str) -> Result<ModelCatalogEntry> {
    let mut weights = Vec::new();
    let mut indexes = Vec::new();

    for entry in WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if has_extension(&path, WEIGHT_EXTENSION) {
            weights.push(path);
        } else if has_extension(&path, INDEX_EXTENSION) {
            indexes.push(path);
        }
    }

    let weight_file_path = weights
        .first()
        .cloned()
        .ok_or_else(|| NeoError::NoModelFound(directory.to_path_buf()))?;
    if weights.len() > 1 {
        log::warn!(
            "Bundle {:?} contains {} weight files, using {:?}",
            directory,
            weights.len(),
            weight_file_path
        );
    }

    let model_name = if name.trim().is_empty() {
        derived_name(&weight_file_path)
    } else {
        name.trim().to_string()
    };

    Ok(ModelCatalogEntry {
        model_name,
        weight_file_path,
        index_file_path: indexes.into_iter().next(),
    })
}

/// In-memory catalog of voice models, keyed by name
///
/// Registering a name twice replaces the earlier entry.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, ModelCatalogEntry>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any previous entry with the same name
    pub fn register(&self, entry: ModelCatalogEntry) {
        log::info!(
            "Registered model '{}' (weights: {:?}, index: {:?})",
            entry.model_name,
            entry.weight_file_path,
            entry.index_file_path
        );
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        if models.insert(entry.model_name.clone(), entry).is_some() {
            log::debug!("Replaced an existing catalog entry");
        }
    }

    /// Scan an extracted bundle and register what it contains
    pub fn scan_and_register(&self, directory: &Path, name: &str) -> Result<ModelCatalogEntry> {
        let entry = scan_bundle(directory, name)?;
        self.register(entry.clone());
        Ok(entry)
    }

    /// Register a weight file already on disk, picking up a sibling index
    /// file (`<stem>.index`) when one exists
    pub fn register_local(&self, weight: &Path, name: &str) -> Result<ModelCatalogEntry> {
        if !is_weight_file(weight) {
            return Err(NeoError::InvalidModelFile(weight.to_path_buf()));
        }
        if !weight.is_file() {
            return Err(NeoError::NoModelFound(weight.to_path_buf()));
        }

        let sibling = weight.with_extension(INDEX_EXTENSION);
        let entry = ModelCatalogEntry {
            model_name: if name.trim().is_empty() {
                derived_name(weight)
            } else {
                name.trim().to_string()
            },
            weight_file_path: weight.to_path_buf(),
            index_file_path: sibling.is_file().then_some(sibling),
        };
        self.register(entry.clone());
        Ok(entry)
    }

    /// Register every bundle directory already extracted under `work_dir`
    ///
    /// Directories without a weight file are skipped. Returns the number of
    /// models registered.
    pub fn rescan_work_dir(&self, work_dir: &Path) -> Result<usize> {
        if !work_dir.is_dir() {
            return Ok(0);
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(work_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut count = 0;
        for dir in dirs {
            match self.scan_and_register(&dir, "") {
                Ok(_) => count += 1,
                Err(NeoError::NoModelFound(_)) => {
                    log::debug!("Skipping {:?}: no weight file", dir);
                }
                Err(e) => return Err(e),
            }
        }
        log::info!("Catalog rebuilt from {:?}: {} model(s)", work_dir, count);
        Ok(count)
    }

    /// Exact-match lookup
    pub fn get(&self, name: &str) -> Option<ModelCatalogEntry> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        models.get(name).cloned()
    }

    /// All entries, sorted by name
    pub fn list(&self) -> Vec<ModelCatalogEntry> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<_> = models.values().cloned().collect();
        entries.sort_by(|a, b| a.model_name.cmp(&b.model_name));
        entries
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpack::{tests::write_zip, unpack};

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_archive_roundtrip_yields_exact_paths() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("model12.zip");
        write_zip(
            &archive,
            &[
                ("Alice/Alice.pth", "weights"),
                ("Alice/added_Alice.index", "index"),
            ],
        );
        let bundle = unpack(&archive, dir.path()).unwrap();

        let registry = ModelRegistry::new();
        let entry = registry
            .scan_and_register(&bundle.directory_path, "Alice")
            .unwrap();

        let root = dir.path().join("model12").join("Alice");
        assert_eq!(entry.weight_file_path, root.join("Alice.pth"));
        assert_eq!(entry.index_file_path, Some(root.join("added_Alice.index")));
        assert_eq!(registry.get("Alice"), Some(entry));
    }

    #[test]
    fn test_registering_twice_is_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a").join("voice.pth"));
        touch(&dir.path().join("b").join("voice.pth"));

        let registry = ModelRegistry::new();
        registry.scan_and_register(&dir.path().join("a"), "Test").unwrap();
        assert_eq!(
            registry.get("Test").unwrap().weight_file_path,
            dir.path().join("a").join("voice.pth")
        );

        registry.scan_and_register(&dir.path().join("b"), "Test").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("Test").unwrap().weight_file_path,
            dir.path().join("b").join("voice.pth")
        );
    }

    #[test]
    fn test_no_weight_file_is_no_model_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("only.index"));

        let registry = ModelRegistry::new();
        let err = registry.scan_and_register(dir.path(), "x").unwrap_err();
        assert!(matches!(err, NeoError::NoModelFound(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_multiple_weights_first_in_walk_order_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b_voice.pth"));
        touch(&dir.path().join("a_voice.pth"));

        let entry = scan_bundle(dir.path(), "").unwrap();
        assert_eq!(entry.weight_file_path, dir.path().join("a_voice.pth"));
        assert_eq!(entry.model_name, "a_voice");
        assert_eq!(entry.index_file_path, None);
    }

    #[test]
    fn test_register_local_picks_up_sibling_index() {
        let dir = tempfile::tempdir().unwrap();
        let weight = dir.path().join("Bob.pth");
        touch(&weight);
        touch(&dir.path().join("Bob.index"));

        let registry = ModelRegistry::new();
        let entry = registry.register_local(&weight, "").unwrap();
        assert_eq!(entry.model_name, "Bob");
        assert_eq!(entry.index_file_path, Some(dir.path().join("Bob.index")));

        let err = registry
            .register_local(&dir.path().join("Bob.onnx"), "")
            .unwrap_err();
        assert!(matches!(err, NeoError::InvalidModelFile(_)));
    }

    #[test]
    fn test_rescan_work_dir_skips_empty_bundles() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("model1").join("Carol.pth"));
        touch(&dir.path().join("model2").join("notes.txt"));
        touch(&dir.path().join("model3.zip"));

        let registry = ModelRegistry::new();
        assert_eq!(registry.rescan_work_dir(dir.path()).unwrap(), 1);
        assert_eq!(registry.list()[0].model_name, "Carol");
        assert_eq!(registry.rescan_work_dir(&dir.path().join("missing")).unwrap(), 0);
    }
}
