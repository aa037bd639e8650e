use super::error::{ApiError, IMAGE_REQUIRED, INVALID_INPUT, NO_TEXT, SENTIMENT_FAILED, TEXT_REQUIRED};
use super::{AppState, LOG_TARGET};
use crate::face::{FaceEmotion, ImageUpload};
use crate::pipeline::{AnalyzeInput, AnalyzeReply, AudioUpload, PipelineError};
use crate::prompt::Sentiment;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of `/api/analyze-sentiment`.
///
/// `emotion` is always one of the eight [`Sentiment`] names. The model's
/// first word is matched case-insensitively and anything else, including
/// free text, is reported as `"Neutral"`. Clients never see the raw model
/// output.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentReply {
    pub emotion: Sentiment,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaceReply {
    pub emotion: FaceEmotion,
}

/// A multipart `file` field.
struct UploadedFile {
    content_type: String,
    bytes: Bytes,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn analyze(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<AnalyzeReply>, ApiError> {
    let input = if has_content_type(&request, "application/json") {
        AnalyzeInput::Text(json_text(request, &state, NO_TEXT).await?)
    } else if has_content_type(&request, "multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        match file_field(multipart).await? {
            Some(file) if file.content_type.starts_with("audio") => {
                AnalyzeInput::Audio(AudioUpload {
                    content_type: file.content_type,
                    bytes: file.bytes,
                })
            }
            Some(file) if file.content_type.starts_with("image") => {
                AnalyzeInput::Image(ImageUpload {
                    content_type: file.content_type,
                    bytes: file.bytes,
                })
            }
            _ => return Err(ApiError::bad_request(INVALID_INPUT)),
        }
    } else {
        return Err(ApiError::bad_request(INVALID_INPUT));
    };

    let reply = state.pipeline.analyze(input).await?;
    Ok(Json(reply))
}

pub async fn analyze_sentiment(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<SentimentReply>, ApiError> {
    let text = json_text(request, &state, TEXT_REQUIRED).await?;
    match state.pipeline.sentiment(&text).await {
        Ok(emotion) => Ok(Json(SentimentReply { emotion })),
        Err(PipelineError::InvalidInput(_)) => Err(ApiError::bad_request(TEXT_REQUIRED)),
        Err(PipelineError::Timeout { .. }) => {
            Err(ApiError::new(StatusCode::GATEWAY_TIMEOUT, SENTIMENT_FAILED))
        }
        Err(e) => {
            tracing::error!(target: LOG_TARGET, error = %e, "sentiment analysis failed");
            Err(ApiError::internal(SENTIMENT_FAILED))
        }
    }
}

pub async fn analyze_face(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FaceReply>, ApiError> {
    let multipart = multipart.map_err(|_| ApiError::bad_request(IMAGE_REQUIRED))?;
    let file = file_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request(IMAGE_REQUIRED))?;

    let emotion = state
        .pipeline
        .classify_face(ImageUpload {
            content_type: file.content_type,
            bytes: file.bytes,
        })
        .await?;
    Ok(Json(FaceReply { emotion }))
}

fn has_content_type(request: &Request, expected: &str) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with(expected))
        .unwrap_or(false)
}

/// Reads `{"text": ...}`; a missing, blank, or malformed body yields `missing`.
async fn json_text(
    request: Request,
    state: &AppState,
    missing: &'static str,
) -> Result<String, ApiError> {
    let Json(body) = Json::<TextBody>::from_request(request, state)
        .await
        .map_err(|e| {
            tracing::debug!(target: LOG_TARGET, error = %e.body_text(), "unreadable JSON body");
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::new(e.status(), e.body_text())
            } else {
                ApiError::bad_request(missing)
            }
        })?;
    match body.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ApiError::bad_request(missing)),
    }
}

/// Finds the `file` field; other fields are skipped.
async fn file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        tracing::debug!(target: LOG_TARGET, %content_type, bytes = bytes.len(), "upload received");
        return Ok(Some(UploadedFile {
            content_type,
            bytes,
        }));
    }
    Ok(None)
}
