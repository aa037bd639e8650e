mod estimator;
pub mod pitch;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use estimator::EmotionEstimator;
pub use pitch::PitchTracker;

/// Mean energy above which speech counts as aroused.
pub const HIGH_ENERGY: f32 = 0.1;
/// Mean energy below which speech counts as subdued.
pub const LOW_ENERGY: f32 = 0.05;
/// Mean pitch separating energetic from tense speech.
pub const HIGH_PITCH_HZ: f32 = 150.0;
/// Upper bound (exclusive) of the calm pitch band.
pub const CALM_PITCH_HZ: f32 = 120.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Calm,
    Energetic,
    Tense,
    Sad,
    Neutral,
}

impl EmotionLabel {
    pub const ALL: [EmotionLabel; 5] = [
        EmotionLabel::Calm,
        EmotionLabel::Energetic,
        EmotionLabel::Tense,
        EmotionLabel::Sad,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Calm => "calm",
            EmotionLabel::Energetic => "energetic",
            EmotionLabel::Tense => "tense",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AnalysisFailure {
    #[error("audio could not be decoded: {0}")]
    Decode(String),
    #[error("waveform is empty")]
    EmptySignal,
    #[error("sample rate must be > 0")]
    InvalidSampleRate,
    #[error("waveform contains non-finite samples")]
    NonFiniteSamples,
    #[error("pitch range does not fit a {frame_length}-sample frame (max period {max_period})")]
    FrameTooShort {
        frame_length: usize,
        max_period: usize,
    },
    #[error("invalid pitch tracker parameters")]
    InvalidParameters,
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("analysis did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("analysis capacity unavailable")]
    Unavailable,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AcousticFeatures {
    /// Mean of squared amplitudes.
    pub energy: f32,
    /// Mean f0 over voiced frames, 0 when none were voiced.
    pub mean_pitch_hz: f32,
    pub voiced_frames: usize,
    pub total_frames: usize,
}

/// Outcome of one estimation. A fallback still carries a usable label.
#[derive(Clone, Debug, PartialEq)]
pub enum Estimate {
    Analyzed {
        label: EmotionLabel,
        features: AcousticFeatures,
    },
    Fallback {
        reason: AnalysisFailure,
    },
}

impl Estimate {
    pub fn label(&self) -> EmotionLabel {
        match self {
            Estimate::Analyzed { label, .. } => *label,
            Estimate::Fallback { .. } => EmotionLabel::Neutral,
        }
    }

    pub fn features(&self) -> Option<&AcousticFeatures> {
        match self {
            Estimate::Analyzed { features, .. } => Some(features),
            Estimate::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Estimate::Fallback { .. })
    }
}

/// Threshold table, first match wins. Both boundaries land on `Neutral`.
pub fn classify(energy: f32, mean_pitch_hz: f32) -> EmotionLabel {
    if energy > HIGH_ENERGY {
        if mean_pitch_hz > HIGH_PITCH_HZ {
            EmotionLabel::Energetic
        } else {
            EmotionLabel::Tense
        }
    } else if energy < LOW_ENERGY {
        if mean_pitch_hz > 0.0 && mean_pitch_hz < CALM_PITCH_HZ {
            EmotionLabel::Calm
        } else {
            EmotionLabel::Sad
        }
    } else {
        EmotionLabel::Neutral
    }
}
