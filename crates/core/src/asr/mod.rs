#[cfg(feature = "whisper-rs")]
mod whisper;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[cfg(feature = "whisper-rs")]
pub use whisper::WhisperAsrBackend;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub audio_duration: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("speech recognition is not available in this build")]
    Unavailable,

    #[error("failed to load model {path}: {details}")]
    ModelLoad { path: String, details: String },

    #[error("audio decode failed: {0}")]
    Decode(#[from] crate::decode::DecodeError),

    #[error("transcription failed: {0}")]
    Inference(String),
}

/// Speech-to-text over an uploaded audio file, in whatever container it came in.
pub trait AsrBackend: Send + Sync {
    fn transcribe(&self, audio: Bytes) -> BoxFuture<'_, Result<Transcript, AsrError>>;
}

/// Stands in for Whisper when the crate is built without it.
#[derive(Clone, Debug, Default)]
pub struct DisabledAsrBackend;

impl AsrBackend for DisabledAsrBackend {
    fn transcribe(&self, _audio: Bytes) -> BoxFuture<'_, Result<Transcript, AsrError>> {
        async { Err(AsrError::Unavailable) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_backend_reports_unavailable() {
        let err = DisabledAsrBackend
            .transcribe(Bytes::from_static(b"RIFF"))
            .await
            .unwrap_err();
        assert!(matches!(err, AsrError::Unavailable));
    }
}
