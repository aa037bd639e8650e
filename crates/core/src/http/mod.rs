//! JSON/multipart HTTP surface over the [`Pipeline`].

mod error;
mod handlers;

use crate::pipeline::Pipeline;
use crate::store::STATIC_ROUTE;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, IMAGE_REQUIRED, INVALID_INPUT, NO_TEXT, SENTIMENT_FAILED, TEXT_REQUIRED};
pub use handlers::{FaceReply, SentimentReply, TextBody};

const LOG_TARGET: &str = "http";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

/// Builds the service router. Reply audio is served from the pipeline's
/// store directory under [`STATIC_ROUTE`].
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let static_dir = state.pipeline.services().store.dir().to_path_buf();

    Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/api/analyze-sentiment", post(handlers::analyze_sentiment))
        .route("/api/analyze-face", post(handlers::analyze_face))
        .route("/health", get(handlers::health))
        .nest_service(STATIC_ROUTE, ServeDir::new(static_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
