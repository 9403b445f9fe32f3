//! Configuration for model downloads and the external engines
//!
//! Stored as YAML. Default location: `~/.config/neo-rvc/config.yaml`

mod io;
mod paths;

pub use io::{load_config, load_or_init_config, save_config};
pub use paths::default_config_path;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the Python interpreter used by the engines
pub const PYTHON_ENV: &str = "NEO_PYTHON";
/// Environment variable overriding the directory holding the engine scripts
pub const SCRIPTS_ENV: &str = "NEO_SCRIPTS";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeoConfig {
    /// Working directory for downloaded archives and extracted bundles
    pub work_dir: PathBuf,
    /// Bundle download settings
    pub fetch: FetchConfig,
    /// External engine settings
    pub engine: EngineConfig,
}

impl Default for NeoConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("temp"),
            fetch: FetchConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl NeoConfig {
    /// Clamp every section to supported ranges
    pub fn validate(&mut self) {
        self.fetch.validate();
        self.engine.validate();
    }

    /// Apply `NEO_PYTHON` / `NEO_SCRIPTS` when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(python) = std::env::var(PYTHON_ENV) {
            self.engine.python = Some(PathBuf::from(python));
        }
        if let Ok(scripts) = std::env::var(SCRIPTS_ENV) {
            self.engine.scripts_dir = Some(PathBuf::from(scripts));
        }
    }
}

/// Bundle download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Hosts bundles may be downloaded from (subdomains included)
    pub trusted_hosts: Vec<String>,
    /// Maximum archive size in bytes
    pub max_bytes: u64,
    /// Read size per streamed chunk
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    /// Maximum stall between two reads before the download is abandoned
    pub read_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            trusted_hosts: vec!["huggingface.co".to_string()],
            max_bytes: 500_000_000,
            chunk_size: 4096,
            connect_timeout_secs: 30,
            read_timeout_secs: 120,
        }
    }
}

impl FetchConfig {
    pub fn validate(&mut self) {
        self.chunk_size = self.chunk_size.clamp(512, 1 << 20);
        self.connect_timeout_secs = self.connect_timeout_secs.max(1);
        self.read_timeout_secs = self.read_timeout_secs.max(1);
        for host in &mut self.trusted_hosts {
            *host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        }
        self.trusted_hosts.retain(|h| !h.is_empty());
    }
}

/// External engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Python interpreter with `audio-separator` and `infer-rvc-python` installed
    pub python: Option<PathBuf>,
    /// Directory containing `neo_separate.py` and `neo_convert.py`
    pub scripts_dir: Option<PathBuf>,
    /// Worker hint forwarded to the conversion engine
    pub parallel_workers: u32,
    /// Resample rate requested for lossy inputs (mp3, ogg, ...)
    pub lossy_resample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            python: None,
            scripts_dir: None,
            parallel_workers: 8,
            lossy_resample_rate: 44100,
        }
    }
}

impl EngineConfig {
    pub fn validate(&mut self) {
        self.parallel_workers = self.parallel_workers.clamp(1, 64);
        self.lossy_resample_rate = self.lossy_resample_rate.clamp(8000, 192_000);
    }

    /// Interpreter to launch, falling back to `python3` on `PATH`
    pub fn python_path(&self) -> PathBuf {
        self.python.clone().unwrap_or_else(|| PathBuf::from("python3"))
    }

    /// Script directory, falling back to `./scripts`
    pub fn scripts_path(&self) -> PathBuf {
        self.scripts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("scripts"))
    }
}
