use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::handlers::AppState;

/// Handle /metrics endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.render();
    (StatusCode::OK, metrics)
}
