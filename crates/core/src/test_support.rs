//! Helpers shared by unit tests.

use crate::asr::{AsrBackend, AsrError, Transcript};
use crate::face::{FaceEmotion, FaceEmotionClassifier, FaceError, ImageUpload};
use crate::llm::{LlmClient, LlmError, LlmRequest};
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use axum::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Mutex;
use std::time::Duration;

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{addr}")
}

pub(crate) struct StubAsr {
    pub text: String,
}

impl AsrBackend for StubAsr {
    fn transcribe(&self, audio: Bytes) -> BoxFuture<'_, Result<Transcript, AsrError>> {
        let text = self.text.clone();
        async move {
            assert!(!audio.is_empty());
            Ok(Transcript {
                text,
                audio_duration: Duration::from_secs(1),
            })
        }
        .boxed()
    }
}

/// Replies with a fixed text, or fails when `reply` is `None`. Records prompts.
pub(crate) struct StubLlm {
    pub reply: Option<String>,
    pub delay: Duration,
    pub prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_owned()),
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl LlmClient for StubLlm {
    fn generate(&self, request: LlmRequest) -> BoxFuture<'_, Result<String, LlmError>> {
        self.prompts.lock().unwrap().push(request.prompt);
        async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone().ok_or_else(|| LlmError::Api {
                status: 400,
                message: "API key not valid".to_owned(),
            })
        }
        .boxed()
    }
}

pub(crate) struct StubFace {
    pub emotion: FaceEmotion,
}

impl FaceEmotionClassifier for StubFace {
    fn classify(&self, image: ImageUpload) -> BoxFuture<'_, Result<FaceEmotion, FaceError>> {
        let emotion = self.emotion;
        async move {
            if image.bytes.is_empty() {
                return Err(FaceError::EmptyImage);
            }
            Ok(emotion)
        }
        .boxed()
    }
}

/// Echoes the request text back as "audio" so tests can check what was spoken.
pub(crate) struct EchoTts;

impl TtsClient for EchoTts {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move { Ok(TtsAudio::mp3(Bytes::from(request.text.into_bytes()))) }.boxed()
    }
}
