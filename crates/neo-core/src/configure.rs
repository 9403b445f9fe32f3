//! Conversion parameters and model resolution
//!
//! Turns a model name plus the caller's pitch settings into the complete
//! [`ConversionRequest`] handed to the conversion engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NeoError, Result};
use crate::registry::{is_weight_file, ModelRegistry};

/// Input extensions that get resampled before conversion
const LOSSY_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "m4a", "aac"];

/// Pitch extraction method used by the conversion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PitchAlgorithm {
    #[serde(rename = "pm")]
    Pm,
    #[serde(rename = "harvest")]
    Harvest,
    #[serde(rename = "crepe")]
    Crepe,
    #[default]
    #[serde(rename = "rmvpe")]
    Rmvpe,
    #[serde(rename = "rmvpe+")]
    RmvpePlus,
}

impl PitchAlgorithm {
    /// Name understood by the conversion engine
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pm => "pm",
            Self::Harvest => "harvest",
            Self::Crepe => "crepe",
            Self::Rmvpe => "rmvpe",
            Self::RmvpePlus => "rmvpe+",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Pm,
            Self::Harvest,
            Self::Crepe,
            Self::Rmvpe,
            Self::RmvpePlus,
        ]
    }
}

impl fmt::Display for PitchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PitchAlgorithm {
    type Err = NeoError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|alg| alg.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::all().iter().map(|a| a.as_str()).collect();
                NeoError::InvalidConfig(format!(
                    "unknown pitch algorithm '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// Caller-chosen conversion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchParams {
    pub pitch_algorithm: PitchAlgorithm,
    /// Transpose in semitones
    pub pitch_level: i32,
    /// How strongly the retrieval index shapes the timbre (0..1)
    pub index_influence: f32,
    /// Median filter radius applied to the extracted pitch curve (0..7)
    pub respiration_median_filter_width: u32,
    /// Mix between input and output volume envelopes (0..1)
    pub envelope_ratio: f32,
    /// Protection of voiceless consonants and breaths (0..0.5)
    pub consonant_breath_protection: f32,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self {
            pitch_algorithm: PitchAlgorithm::Rmvpe,
            pitch_level: 0,
            index_influence: 0.75,
            respiration_median_filter_width: 3,
            envelope_ratio: 0.25,
            consonant_breath_protection: 0.5,
        }
    }
}

impl PitchParams {
    /// Clamp values to the ranges the conversion engine accepts
    ///
    /// NaN and infinite values are rejected; clamping cannot place them.
    pub fn validate(&mut self) -> Result<()> {
        for (flag, value) in [
            ("index influence", self.index_influence),
            ("envelope ratio", self.envelope_ratio),
            ("consonant breath protection", self.consonant_breath_protection),
        ] {
            if !value.is_finite() {
                return Err(NeoError::InvalidConfig(format!(
                    "{} must be a finite number, got {}",
                    flag, value
                )));
            }
        }

        self.pitch_level = self.pitch_level.clamp(-24, 24);
        self.index_influence = self.index_influence.clamp(0.0, 1.0);
        self.respiration_median_filter_width = self.respiration_median_filter_width.min(7);
        self.envelope_ratio = self.envelope_ratio.clamp(0.0, 1.0);
        self.consonant_breath_protection = self.consonant_breath_protection.clamp(0.0, 0.5);
        Ok(())
    }
}

/// Everything the conversion engine needs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub run_tag: String,
    pub weight_file_path: PathBuf,
    pub index_file_path: Option<PathBuf>,
    pub pitch_algorithm: PitchAlgorithm,
    pub pitch_level: i32,
    pub index_influence: f32,
    pub respiration_median_filter_width: u32,
    pub envelope_ratio: f32,
    pub consonant_breath_protection: f32,
    /// Target sample rate, 0 = keep the input rate
    pub resample_rate: u32,
}

/// Look up a model by exact name and check its weight file type
pub fn resolve(registry: &ModelRegistry, model_name: &str) -> Result<(PathBuf, Option<PathBuf>)> {
    let entry = registry
        .get(model_name)
        .ok_or_else(|| NeoError::ModelNotFound(model_name.to_string()))?;

    if !is_weight_file(&entry.weight_file_path) {
        return Err(NeoError::InvalidModelFile(entry.weight_file_path));
    }
    Ok((entry.weight_file_path, entry.index_file_path))
}

/// True when the file extension names a lossy compressed format
pub fn is_lossy_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| LOSSY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Merge resolved model paths with the caller's settings
///
/// `resample_rate` is `lossy_resample_rate` for lossy primary inputs and 0
/// otherwise.
pub fn build_request(
    run_tag: &str,
    weight_file_path: PathBuf,
    index_file_path: Option<PathBuf>,
    params: &PitchParams,
    primary_input: &Path,
    lossy_resample_rate: u32,
) -> Result<ConversionRequest> {
    let mut params = params.clone();
    params.validate()?;

    Ok(ConversionRequest {
        run_tag: run_tag.to_string(),
        weight_file_path,
        index_file_path,
        pitch_algorithm: params.pitch_algorithm,
        pitch_level: params.pitch_level,
        index_influence: params.index_influence,
        respiration_median_filter_width: params.respiration_median_filter_width,
        envelope_ratio: params.envelope_ratio,
        consonant_breath_protection: params.consonant_breath_protection,
        resample_rate: if is_lossy_input(primary_input) {
            lossy_resample_rate
        } else {
            0
        },
    })
}
