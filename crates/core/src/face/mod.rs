mod llm;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use llm::LlmFaceClassifier;

/// FER-style facial expression labels.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FaceEmotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl FaceEmotion {
    pub const ALL: [FaceEmotion; 7] = [
        FaceEmotion::Angry,
        FaceEmotion::Disgust,
        FaceEmotion::Fear,
        FaceEmotion::Happy,
        FaceEmotion::Sad,
        FaceEmotion::Surprise,
        FaceEmotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaceEmotion::Angry => "angry",
            FaceEmotion::Disgust => "disgust",
            FaceEmotion::Fear => "fear",
            FaceEmotion::Happy => "happy",
            FaceEmotion::Sad => "sad",
            FaceEmotion::Surprise => "surprise",
            FaceEmotion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for FaceEmotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(thiserror::Error, Debug)]
pub enum FaceError {
    #[error("image is empty")]
    EmptyImage,

    #[error("face classification failed: {0}")]
    Llm(#[from] crate::llm::LlmError),
}

pub trait FaceEmotionClassifier: Send + Sync {
    fn classify(&self, image: ImageUpload) -> BoxFuture<'_, Result<FaceEmotion, FaceError>>;
}
