use crate::config::LlmConfig;
use crate::llm::{LlmClient, LlmError, LlmRequest};
use crate::util::{retry_with_backoff, RetryConfig};
use base64::Engine;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "llm::gemini";

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    retry: RetryConfig,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.expose().to_owned(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate_once(&self, body: &GenerateRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse JSON: {e}")))?;

        parsed.into_text()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(Blob),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

impl From<&LlmRequest> for GenerateRequest {
    fn from(request: &LlmRequest) -> Self {
        let mut parts = vec![Part::Text(request.prompt.clone())];
        if let Some(image) = &request.image {
            parts.push(Part::InlineData(Blob {
                mime_type: image.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
            }));
        }
        Self {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(reason));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no candidates in response".to_owned()))?;

        // A candidate without any text part was cut off, usually by a
        // safety filter; there is no reply to speak.
        let texts: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if texts.is_empty() {
            let reason = candidate
                .finish_reason
                .unwrap_or_else(|| "no content in candidate".to_owned());
            return Err(LlmError::Blocked(reason));
        }
        Ok(texts.concat())
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: LlmRequest) -> BoxFuture<'_, Result<String, LlmError>> {
        async move {
            let body = GenerateRequest::from(&request);
            let text = retry_with_backoff(
                &self.retry,
                || self.generate_once(&body),
                LlmError::is_retryable,
            )
            .await
            .map_err(|e| {
                tracing::warn!(target: LOG_TARGET, model = %self.model, error = %e, "gemini request failed");
                e
            })?;

            tracing::debug!(target: LOG_TARGET, model = %self.model, chars = text.len(), "gemini replied");
            Ok(text)
        }
        .boxed()
    }
}
