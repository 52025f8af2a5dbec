use std::sync::Arc;

use lifeguard_pipeline::{DetectionPipeline, SessionStore};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registry of live detection sessions.
    pub sessions: Arc<SessionStore>,
    /// Detection pipeline. `None` when the detector failed to load at startup.
    pub pipeline: Option<Arc<DetectionPipeline>>,
}

impl AppState {
    pub fn model_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    /// The pipeline, or [`AppError::ModelNotLoaded`].
    pub fn pipeline(&self) -> AppResult<&Arc<DetectionPipeline>> {
        self.pipeline.as_ref().ok_or(AppError::ModelNotLoaded)
    }
}
