//! Error types for model acquisition and conversion runs

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while acquiring models or running a conversion
#[derive(Error, Debug)]
pub enum NeoError {
    #[error("Untrusted model source '{url}': {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("Download exceeds the {limit} byte limit ({size} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to extract archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("No .pth model file found under {0}")]
    NoModelFound(PathBuf),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model file must be a .pth file: {0}")]
    InvalidModelFile(PathBuf),

    #[error("No audio files provided")]
    NoAudioProvided,

    #[error("Failed to probe audio file {path}: {reason}")]
    AudioProbe { path: PathBuf, reason: String },

    /// Failure reported by (or while talking to) an external engine
    #[error("{engine} engine failed: {reason}")]
    Engine {
        engine: &'static str,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NeoError {
    pub(crate) fn engine(engine: &'static str, reason: impl Into<String>) -> Self {
        Self::Engine {
            engine,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NeoError>;
