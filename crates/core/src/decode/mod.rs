#[cfg(feature = "ffmpeg-sidecar")]
mod ffmpeg;
pub(crate) mod native;

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "ffmpeg-sidecar")]
pub use ffmpeg::FfmpegAudioDecoder;
pub use native::decode_audio;

/// Mono PCM samples at their native rate.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        duration_from_sample_count(self.sample_rate, 1, self.samples.len())
    }
}

/// Extension or MIME type used to pick a demuxer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatHint {
    pub extension: Option<String>,
    pub mime_type: Option<String>,
}

impl FormatHint {
    pub fn from_mime(mime_type: &str) -> Self {
        let extension = match mime_type.split(';').next().unwrap_or("").trim() {
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
            "audio/mpeg" | "audio/mp3" => Some("mp3"),
            "audio/flac" | "audio/x-flac" => Some("flac"),
            "audio/ogg" | "audio/vorbis" => Some("ogg"),
            _ => None,
        };
        Self {
            extension: extension.map(str::to_owned),
            mime_type: Some(mime_type.to_owned()),
        }
    }

    pub fn wav() -> Self {
        Self {
            extension: Some("wav".to_owned()),
            mime_type: Some("audio/wav".to_owned()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("unsupported or unrecognised audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no decodable audio track")]
    NoAudioTrack,

    #[error("unknown sample rate")]
    UnknownSampleRate,

    #[error("audio decode failed: {0}")]
    Codec(String),

    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),

    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

pub fn i16_to_f32_pcm(samples: &[i16]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let scale = 1.0f32 / 32768.0f32;
    samples.iter().map(|&s| f32::from(s) * scale).collect()
}

pub fn duration_from_sample_count(
    sample_rate_hz: u32,
    channels: u16,
    sample_count: usize,
) -> Duration {
    if sample_rate_hz == 0 || channels == 0 {
        return Duration::from_secs(0);
    }
    let frames = sample_count / usize::from(channels);
    let micros = (u128::from(frames as u64) * 1_000_000u128) / u128::from(sample_rate_hz);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}
