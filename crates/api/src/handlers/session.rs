//! Handlers for inspecting and removing detection sessions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use lifeguard_core::types::SessionId;
use lifeguard_pipeline::payload::{StatusSnapshot, STATUS_DETECTION_LIMIT};
use lifeguard_pipeline::DetectionSession;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Parse a session id from the path. Malformed ids are reported as unknown.
pub fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    uuid::Uuid::parse_str(raw).map_err(|_| AppError::session_not_found(raw))
}

pub async fn find_session(state: &AppState, raw: &str) -> AppResult<Arc<DetectionSession>> {
    let id = parse_session_id(raw)?;
    state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::session_not_found(raw))
}

/// GET /detection_status/{session_id}
///
/// Consistent snapshot of the session. The latest annotated frame is included
/// only if no earlier poll or stream event has delivered it.
pub async fn detection_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<StatusSnapshot>> {
    let session = find_session(&state, &session_id).await?;
    Ok(Json(session.status_snapshot(STATUS_DETECTION_LIMIT).await))
}

/// DELETE /sessions/{session_id}
///
/// Forget a session, cancelling its processing if it is still running.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_session_id(&session_id)?;
    state
        .sessions
        .remove(&id)
        .await
        .ok_or_else(|| AppError::session_not_found(&session_id))?;
    tracing::info!(%session_id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}
