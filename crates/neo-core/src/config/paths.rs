//! Standard locations for the neo-rvc configuration file

use std::path::PathBuf;

/// Get the default config file path
///
/// Returns: `<config_dir>/neo-rvc/config.yaml` (e.g. `~/.config/neo-rvc/config.yaml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neo-rvc")
        .join("config.yaml")
}
