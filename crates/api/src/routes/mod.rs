pub mod detection;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the full route tree. All routes live at the root.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(detection::router())
}
