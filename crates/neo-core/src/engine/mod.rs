//! Boundaries to the external separation and conversion engines
//!
//! Neither engine is implemented here. The traits describe the calls the
//! pipeline makes; [`python`] provides implementations that drive the
//! Python packages through subprocesses, and tests substitute in-process
//! fakes.

pub mod python;

use std::path::{Path, PathBuf};

use crate::configure::ConversionRequest;
use crate::error::Result;

pub use python::{PythonConverter, PythonRuntime, PythonSeparator};

/// Stems produced by the separation engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemPaths {
    pub vocals: PathBuf,
    pub instrumental: PathBuf,
}

/// Splits a mixed track into vocal and instrumental stems
pub trait SeparationEngine: Send + Sync {
    fn separate(&self, audio: &Path) -> Result<StemPaths>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Pitch-conditioned voice conversion
///
/// `apply_config` must be called before `convert`; the engine keeps the most
/// recently applied request.
pub trait ConversionEngine: Send + Sync {
    fn apply_config(&self, request: &ConversionRequest) -> Result<()>;

    /// Convert `audio_files` under `tag`, returning the output paths
    ///
    /// With `overwrite == false` an existing output for the same tag is kept.
    fn convert(
        &self,
        audio_files: &[PathBuf],
        tag: &str,
        overwrite: bool,
        parallel_workers: u32,
    ) -> Result<Vec<PathBuf>>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}
