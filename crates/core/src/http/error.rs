use crate::asr::AsrError;
use crate::face::FaceError;
use crate::pipeline::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::LOG_TARGET;

pub const NO_TEXT: &str = "No text provided in JSON";
pub const INVALID_INPUT: &str = "Invalid input. Provide text JSON, audio, or image.";
pub const TEXT_REQUIRED: &str = "Text is required.";
pub const SENTIMENT_FAILED: &str = "Failed to analyze emotion.";
pub const IMAGE_REQUIRED: &str = "Image file required";

/// An error rendered as `{"error": message}` with the given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidInput(_) | PipelineError::Face(FaceError::EmptyImage) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Transcription(AsrError::Unavailable) | PipelineError::CapacityClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(target: LOG_TARGET, status = self.status.as_u16(), error = %self.message, "request failed");
        } else {
            tracing::warn!(target: LOG_TARGET, status = self.status.as_u16(), error = %self.message, "request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::time::Duration;

    #[test]
    fn pipeline_errors_map_to_status() {
        let cases = [
            (PipelineError::InvalidInput(NO_TEXT.to_owned()), StatusCode::BAD_REQUEST),
            (
                PipelineError::Timeout {
                    stage: "llm",
                    timeout: Duration::from_secs(1),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PipelineError::Transcription(AsrError::Unavailable),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::Llm(LlmError::Blocked("SAFETY".to_owned())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn invalid_input_keeps_message() {
        let err = ApiError::from(PipelineError::InvalidInput(NO_TEXT.to_owned()));
        assert_eq!(err.message, NO_TEXT);
    }
}
