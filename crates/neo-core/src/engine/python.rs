//! Python subprocess engines
//!
//! The separation (`audio-separator`) and conversion (`infer-rvc-python`)
//! engines are Python packages. Each call runs a small entry script:
//! 1. The request is written to the script's stdin as JSON
//! 2. The script calls into the Python package
//! 3. Output paths come back as JSON on stdout
//! 4. A non-zero exit status is reported with the script's stderr
//!
//! Subprocesses keep the Python runtime out of our address space and let the
//! engines run in whatever environment `NEO_PYTHON` points at.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ConversionEngine, SeparationEngine, StemPaths};
use crate::config::EngineConfig;
use crate::configure::ConversionRequest;
use crate::error::{NeoError, Result};

/// Entry script for source separation
pub const SEPARATE_SCRIPT: &str = "neo_separate.py";
/// Entry script for voice conversion
pub const CONVERT_SCRIPT: &str = "neo_convert.py";

/// Interpreter plus the directory holding the entry scripts
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    python: PathBuf,
    scripts_dir: PathBuf,
}

impl PythonRuntime {
    pub fn new(python: impl Into<PathBuf>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.python_path(), config.scripts_path())
    }

    fn script_path(&self, script: &str, engine: &'static str) -> Result<PathBuf> {
        let path = self.scripts_dir.join(script);
        if !path.is_file() {
            return Err(NeoError::engine(
                engine,
                format!("entry script not found at {:?}", path),
            ));
        }
        Ok(path)
    }

    /// Run `script` with `request` on stdin and parse its stdout as JSON
    fn run<Req, Resp>(&self, engine: &'static str, script: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let script_path = self.script_path(script, engine)?;
        let payload = serde_json::to_vec(request)
            .map_err(|e| NeoError::engine(engine, format!("failed to encode request: {}", e)))?;

        log::debug!("Running {:?} {:?}", self.python, script_path);

        let mut child = Command::new(&self.python)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                NeoError::engine(engine, format!("failed to start {:?}: {}", self.python, e))
            })?;

        // A script that dies before reading stdin is reported through its exit status
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload) {
                log::warn!("Failed to send request to {}: {}", script, e);
            }
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NeoError::engine(
                engine,
                format!(
                    "{} exited with code {:?}: {}",
                    script,
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).map_err(|e| {
            NeoError::engine(
                engine,
                format!(
                    "unreadable output ({}): {}",
                    e,
                    stdout.chars().take(200).collect::<String>()
                ),
            )
        })
    }
}

#[derive(Debug, Serialize)]
struct SeparateRequest<'a> {
    audio: &'a Path,
    output_dir: &'a Path,
}

#[derive(Debug, Deserialize)]
struct SeparateResponse {
    #[serde(default)]
    stems: Vec<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

/// Vocal/instrumental separation through `audio-separator`
pub struct PythonSeparator {
    runtime: PythonRuntime,
    output_dir: PathBuf,
}

impl PythonSeparator {
    const ENGINE: &'static str = "separation";

    pub fn new(runtime: PythonRuntime, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            output_dir: output_dir.into(),
        }
    }
}

impl SeparationEngine for PythonSeparator {
    fn separate(&self, audio: &Path) -> Result<StemPaths> {
        std::fs::create_dir_all(&self.output_dir)?;

        let response: SeparateResponse = self.runtime.run(
            Self::ENGINE,
            SEPARATE_SCRIPT,
            &SeparateRequest {
                audio,
                output_dir: &self.output_dir,
            },
        )?;

        if let Some(error) = response.error {
            return Err(NeoError::engine(Self::ENGINE, error));
        }

        let mut stems = response.stems.into_iter();
        match (stems.next(), stems.next()) {
            (Some(vocals), Some(instrumental)) => Ok(StemPaths {
                vocals,
                instrumental,
            }),
            _ => Err(NeoError::engine(
                Self::ENGINE,
                "expected vocal and instrumental stems",
            )),
        }
    }

    fn name(&self) -> &'static str {
        "audio-separator"
    }
}

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    config: &'a ConversionRequest,
    audio_files: &'a [PathBuf],
    tag: &'a str,
    overwrite: bool,
    parallel_workers: u32,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    outputs: Vec<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

/// RVC voice conversion through `infer-rvc-python`
pub struct PythonConverter {
    runtime: PythonRuntime,
    applied: Mutex<Option<ConversionRequest>>,
}

impl PythonConverter {
    const ENGINE: &'static str = "conversion";

    pub fn new(runtime: PythonRuntime) -> Self {
        Self {
            runtime,
            applied: Mutex::new(None),
        }
    }
}

impl ConversionEngine for PythonConverter {
    fn apply_config(&self, request: &ConversionRequest) -> Result<()> {
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        *applied = Some(request.clone());
        Ok(())
    }

    fn convert(
        &self,
        audio_files: &[PathBuf],
        tag: &str,
        overwrite: bool,
        parallel_workers: u32,
    ) -> Result<Vec<PathBuf>> {
        let config = self
            .applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| NeoError::engine(Self::ENGINE, "no configuration applied"))?;

        let response: ConvertResponse = self.runtime.run(
            Self::ENGINE,
            CONVERT_SCRIPT,
            &ConvertRequest {
                config: &config,
                audio_files,
                tag,
                overwrite,
                parallel_workers,
            },
        )?;

        if let Some(error) = response.error {
            return Err(NeoError::engine(Self::ENGINE, error));
        }
        Ok(response.outputs)
    }

    fn name(&self) -> &'static str {
        "infer-rvc-python"
    }
}
