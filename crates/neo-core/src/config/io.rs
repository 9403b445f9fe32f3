//! YAML configuration loading and saving
//!
//! Generic over any serializable configuration type so the CLI and tests can
//! share the same fallback behaviour.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;

/// Read a YAML config, falling back to `T::default()`
///
/// A missing file is not an error. A file that cannot be read or parsed is
/// logged and ignored.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("No config at {:?}, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("Cannot read config {:?} ({}), using defaults", path, e);
            return T::default();
        }
    };

    serde_yaml::from_str(&contents).unwrap_or_else(|e| {
        log::warn!("Ignoring invalid config {:?}: {}", path, e);
        T::default()
    })
}

/// [`load_config`], writing the defaults out when no file exists yet
///
/// Failing to write the file is logged; the defaults are still returned.
pub fn load_or_init_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    if path.exists() {
        return load_config(path);
    }

    let config = T::default();
    match save_config(&config, path) {
        Ok(()) => log::info!("Wrote default config to {:?}", path),
        Err(e) => log::warn!("Could not write default config: {:#}", e),
    }
    config
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}
