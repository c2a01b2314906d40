use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

// Liveness probe; sits outside the session stack.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// Counter snapshot, routed only in debug mode
pub async fn debug_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}
