//! Command line arguments
//!
//! The flags keep their historical spellings (`-aud`, `-palf0`, ...). Those
//! multi-letter single-dash forms are rewritten to their long equivalents
//! before clap sees them.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use neo_core::{PitchAlgorithm, PitchParams};

/// Single-dash legacy flags and the long flag each one stands for
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("-aud", "--audio_files"),
    ("-palf0", "--pitch_alg"),
    ("-pl", "--pitch_lvl"),
    ("-idx", "--index_inf"),
    ("-rmf", "--r_m_f"),
    ("-er", "--e_r"),
    ("-cbp", "--c_b_p"),
];

/// Median filter width used when the flag is given as a plain `true`
const DEFAULT_FILTER_WIDTH: u32 = 3;
/// Consonant protection used when the flag is given as a plain `true`
const DEFAULT_PROTECTION: f32 = 0.5;

/// Neo RVC CLI - convert the vocals of a song with an RVC voice model
#[derive(Parser, Debug)]
#[command(name = "neo-rvc")]
#[command(version)]
#[command(about = "Neo RVC CLI: separate vocals and convert them with an RVC voice model")]
pub struct Args {
    /// Model name in the catalog, or a path to a .pth file
    #[arg(short = 'm', long = "model")]
    pub model: String,

    /// Audio files; the first is separated, the rest are converted as given
    #[arg(long = "audio_files", num_args = 1.., required = true)]
    pub audio_files: Vec<PathBuf>,

    /// Pitch algorithm: pm, harvest, crepe, rmvpe or rmvpe+
    #[arg(long = "pitch_alg")]
    pub pitch_alg: PitchAlgorithm,

    /// Pitch shift in semitones
    #[arg(long = "pitch_lvl", allow_negative_numbers = true)]
    pub pitch_lvl: i32,

    /// Index influence (0..1)
    #[arg(long = "index_inf", value_parser = parse_finite)]
    pub index_inf: f32,

    /// Respiration median filtering width (0..7, or true/false)
    #[arg(long = "r_m_f", value_parser = parse_filter_width)]
    pub r_m_f: u32,

    /// Envelope ratio (0..1)
    #[arg(long = "e_r", value_parser = parse_finite)]
    pub e_r: f32,

    /// Consonant breath protection (0..0.5, or true/false)
    #[arg(long = "c_b_p", value_parser = parse_protection)]
    pub c_b_p: f32,

    /// Download this bundle before running and register it under --model.
    /// The name lasts for this run only; later runs find the bundle under
    /// its .pth file name
    #[arg(long = "model_url")]
    pub model_url: Option<String>,

    /// Config file (default: ~/.config/neo-rvc/config.yaml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse process arguments, accepting the legacy flag spellings
    pub fn parse_legacy() -> Self {
        Self::parse_from(normalize_legacy_flags(std::env::args_os()))
    }

    pub fn pitch_params(&self) -> PitchParams {
        PitchParams {
            pitch_algorithm: self.pitch_alg,
            pitch_level: self.pitch_lvl,
            index_influence: self.index_inf,
            respiration_median_filter_width: self.r_m_f,
            envelope_ratio: self.e_r,
            consonant_breath_protection: self.c_b_p,
        }
    }
}

/// Rewrite `-aud`, `-palf0`, ... (also in `-flag=value` form) to long flags
pub fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            for (legacy, long) in LEGACY_FLAGS {
                if text == *legacy {
                    return OsString::from(*long);
                }
                if let Some(value) = text
                    .strip_prefix(legacy)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    return OsString::from(format!("{}={}", long, value));
                }
            }
            arg
        })
        .collect()
}

fn parse_filter_width(s: &str) -> Result<u32, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(DEFAULT_FILTER_WIDTH),
        "false" => Ok(0),
        other => other
            .parse()
            .map_err(|_| format!("expected an integer or true/false, got '{}'", s)),
    }
}

fn parse_finite(s: &str) -> Result<f32, String> {
    match s.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("expected a finite number, got '{}'", s)),
    }
}

fn parse_protection(s: &str) -> Result<f32, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(DEFAULT_PROTECTION),
        "false" => Ok(0.0),
        _ => parse_finite(s).map_err(|_| format!("expected a number or true/false, got '{}'", s)),
    }
}
