//! Audio duration probing (Symphonia)
//!
//! Duration is informational only; callers log failures and carry on.

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{NeoError, Result};

/// Duration of an audio file in seconds
///
/// Uses the container's frame count when present, otherwise sums packet
/// durations without decoding.
pub fn probe_duration(path: &Path) -> Result<f64> {
    let fail = |reason: String| NeoError::AudioProbe {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| fail(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| fail("no audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| fail("unknown sample rate".to_string()))?;

    let n_frames = track.codec_params.n_frames;

    let frames = match n_frames {
        Some(n) => n,
        None => {
            let mut total = 0u64;
            while let Ok(packet) = format.next_packet() {
                if packet.track_id() == track_id {
                    total += packet.dur;
                }
            }
            total
        }
    };

    Ok(frames as f64 / sample_rate as f64)
}
