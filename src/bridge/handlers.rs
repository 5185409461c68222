use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::error;

use super::state::AppState;
use crate::session::StateSnapshot;

// Payload field names are fixed by the bridge contract; internal faults are
// caught here and converted to `false` / default snapshot so nothing ever
// propagates unhandled across the process boundary.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingRequest {
    pub output_path: String,
    pub chunk_duration_ms: Option<u64>,
}

/// POST /recording/start
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> Json<bool> {
    match state
        .manager
        .start(&req.output_path, req.chunk_duration_ms)
        .await
    {
        Ok(started) => Json(started),
        Err(e) => {
            error!("startRecording failed: {e}");
            Json(false)
        }
    }
}

/// POST /recording/stop
pub async fn stop_recording(State(state): State<AppState>) -> Json<bool> {
    Json(state.manager.stop().await)
}

/// POST /recording/pause
pub async fn pause_recording(State(state): State<AppState>) -> Json<bool> {
    Json(state.manager.pause().await)
}

/// POST /recording/resume
pub async fn resume_recording(State(state): State<AppState>) -> Json<bool> {
    Json(state.manager.resume().await)
}

/// GET /recording/state
pub async fn get_recording_state(State(state): State<AppState>) -> Json<StateSnapshot> {
    Json(state.manager.snapshot().await)
}

/// POST /power/exemption
///
/// Best-effort and fire-and-forget: the manager logs failures internally,
/// so this always acknowledges.
pub async fn request_exemption(State(state): State<AppState>) -> Json<bool> {
    state.manager.request_exemption();
    Json(true)
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
