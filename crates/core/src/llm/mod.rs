mod gemini;

use bytes::Bytes;
use futures::future::BoxFuture;

pub use gemini::GeminiClient;

/// An image sent alongside the prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl LlmRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("llm api error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid llm response: {0}")]
    InvalidResponse(String),

    #[error("prompt blocked: {0}")]
    Blocked(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(e) => e.is_timeout() || e.is_connect(),
            LlmError::Api { status, .. } => crate::util::is_http_retryable(*status),
            LlmError::InvalidResponse(_) | LlmError::Blocked(_) => false,
        }
    }
}

/// Text generation. Implementations return the raw reply text, untrimmed.
pub trait LlmClient: Send + Sync {
    fn generate(&self, request: LlmRequest) -> BoxFuture<'_, Result<String, LlmError>>;
}
