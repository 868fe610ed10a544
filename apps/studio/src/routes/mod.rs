pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::orchestration::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/status", get(handlers::handle_status))
        .route(
            "/api/v1/source",
            get(handlers::handle_get_source).put(handlers::handle_edit_source),
        )
        .route("/api/v1/generate", post(handlers::handle_generate))
        .route("/api/v1/recompile", post(handlers::handle_recompile))
        .route("/api/v1/artifact", get(handlers::handle_artifact_info))
        .route("/api/v1/artifacts/:id", get(handlers::handle_artifact_bytes))
        .route(
            "/api/v1/artifact/download",
            get(handlers::handle_download),
        )
        .route("/api/v1/artifact/export", post(handlers::handle_export))
        .with_state(state)
}
