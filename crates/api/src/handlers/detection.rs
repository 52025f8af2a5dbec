//! Handlers for starting detections.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use lifeguard_pipeline::pipeline::remove_upload;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::upload::stage_video;

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub drowning_detected: bool,
    pub message: &'static str,
}

impl DetectResponse {
    fn new(drowning_detected: bool) -> Self {
        Self {
            drowning_detected,
            message: if drowning_detected {
                "Drowning detected!"
            } else {
                "No drowning detected"
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectLiveResponse {
    pub session_id: String,
    pub message: &'static str,
}

/// POST /detect
///
/// Processes the uploaded `video` to a verdict before responding. The run
/// continues, and the upload is still cleaned up, if the client goes away.
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DetectResponse>> {
    let pipeline = Arc::clone(state.pipeline()?);
    let upload = stage_video(&mut multipart, &state.config.upload_dir).await?;
    tracing::info!(
        filename = %upload.filename,
        size_bytes = upload.size_bytes,
        "Running blocking detection",
    );

    let path = upload.path;
    let outcome = tokio::spawn(async move {
        let result = pipeline.run_simple(&path).await;
        remove_upload(&path).await;
        result
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Detection task failed: {e}")))??;

    Ok(Json(DetectResponse::new(outcome.drowning_detected)))
}

/// POST /detect_live
///
/// Stages the uploaded `video`, registers a session and starts processing
/// in the background. Progress is read through the session endpoints.
pub async fn detect_live(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DetectLiveResponse>> {
    let pipeline = Arc::clone(state.pipeline()?);
    let upload = stage_video(&mut multipart, &state.config.upload_dir).await?;

    let session = match state.sessions.create().await {
        Ok(session) => session,
        Err(e) => {
            remove_upload(&upload.path).await;
            return Err(e.into());
        }
    };
    let session_id = session.id();
    tracing::info!(
        %session_id,
        filename = %upload.filename,
        size_bytes = upload.size_bytes,
        "Starting live detection",
    );

    pipeline.spawn_live(session, upload.path);

    Ok(Json(DetectLiveResponse {
        session_id: session_id.to_string(),
        message: "Detection started",
    }))
}
