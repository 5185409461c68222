use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the bridge router with all command routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recording/start", post(handlers::start_recording))
        .route("/recording/stop", post(handlers::stop_recording))
        .route("/recording/pause", post(handlers::pause_recording))
        .route("/recording/resume", post(handlers::resume_recording))
        // Reconciliation query
        .route("/recording/state", get(handlers::get_recording_state))
        // Power management
        .route("/power/exemption", post(handlers::request_exemption))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
