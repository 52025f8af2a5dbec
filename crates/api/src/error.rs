use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifeguard_core::error::CoreError;
use lifeguard_pipeline::{PipelineError, StoreError};
use lifeguard_vision::FrameSourceError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `lifeguard_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The detector failed to load at startup.
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// The uploaded file could not be opened as a video.
    #[error("Unreadable video: {0}")]
    UnreadableVideo(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn session_not_found(id: impl Into<String>) -> Self {
        AppError::Core(CoreError::NotFound {
            entity: "Session",
            id: id.into(),
        })
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AtCapacity(_) => AppError::Core(CoreError::Unavailable(err.to_string())),
            StoreError::Duplicate(_) => AppError::Core(CoreError::Conflict(err.to_string())),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Source(FrameSourceError::UnreadableVideo(_)) => {
                AppError::UnreadableVideo(err.to_string())
            }
            PipelineError::WorkersClosed => {
                AppError::Core(CoreError::Unavailable(err.to_string()))
            }
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unavailable(msg) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    msg.clone(),
                ),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::ModelNotLoaded => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MODEL_NOT_LOADED",
                "Model not loaded".to_string(),
            ),
            AppError::UnreadableVideo(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNREADABLE_VIDEO",
                msg.clone(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
