mod google;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use google::{split_text, GoogleTranslateTts, MAX_CHUNK_CHARS};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsRequest {
    pub text: String,
    /// BCP-47-ish language code such as `en` or `pt-BR`; client default when `None`.
    pub lang: Option<String>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: None,
        }
    }
}

/// Encoded audio, ready to be written out and served as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TtsAudio {
    pub mime_type: String,
    pub extension: String,
    pub bytes: Bytes,
}

impl TtsAudio {
    pub fn mp3(bytes: Bytes) -> Self {
        Self {
            mime_type: "audio/mpeg".to_owned(),
            extension: "mp3".to_owned(),
            bytes,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error("invalid tts url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("tts http error {0}")]
    HttpStatus(u16),

    #[error("tts service returned no audio")]
    EmptyAudio,
}

pub trait TtsClient: Send + Sync {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>>;
}
