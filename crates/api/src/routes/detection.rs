//! Route definitions for detections and their sessions.
//!
//! ```text
//! POST   /detect                          detect
//! POST   /detect_live                     detect_live
//! GET    /detection_status/{session_id}   detection_status
//! GET    /live_updates/{session_id}       live_updates (SSE)
//! DELETE /sessions/{session_id}           delete_session
//! ```

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{detection, live_updates, session};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/detect", post(detection::detect))
        .route("/detect_live", post(detection::detect_live))
        .route(
            "/detection_status/{session_id}",
            get(session::detection_status),
        )
        .route(
            "/live_updates/{session_id}",
            get(live_updates::live_updates),
        )
        .route("/sessions/{session_id}", delete(session::delete_session))
}
