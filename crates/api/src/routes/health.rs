use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    /// Whether the detector model loaded at startup.
    pub model_loaded: bool,
    /// Name reported by the detector, when loaded.
    pub model_name: Option<String>,
    /// Sessions currently held in the registry.
    pub active_sessions: usize,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct EndpointIndex {
    pub detect: &'static str,
    pub detect_live: &'static str,
    pub status: &'static str,
    pub live_updates: &'static str,
    pub delete_session: &'static str,
}

/// The loaded detector model.
#[derive(Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub classes: Vec<String>,
}

/// Service description returned at `/`.
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    /// `loaded` or `failed`.
    pub model_status: &'static str,
    /// Absent when the detector failed to load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSummary>,
    pub endpoints: EndpointIndex,
}

/// GET /health -- process liveness, model state and session count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.model_loaded(),
        model_name: state
            .pipeline
            .as_ref()
            .map(|pipeline| pipeline.detector_name().to_string()),
        active_sessions: state.sessions.len().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET / -- service description and endpoint index.
async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "Drowning Detection API with Live Updates",
        model_status: if state.model_loaded() {
            "loaded"
        } else {
            "failed"
        },
        model: state.pipeline.as_ref().map(|pipeline| ModelSummary {
            name: pipeline.detector_name().to_string(),
            classes: pipeline.detector_classes().to_vec(),
        }),
        endpoints: EndpointIndex {
            detect: "POST /detect (simple detection)",
            detect_live: "POST /detect_live (live detection)",
            status: "GET /detection_status/{session_id}",
            live_updates: "GET /live_updates/{session_id} (SSE)",
            delete_session: "DELETE /sessions/{session_id}",
        },
    })
}

/// Mount the health check and service description routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
