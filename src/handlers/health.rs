use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use opentelemetry::{trace::SpanKind, KeyValue};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, handlers::AppState, metrics::Route, record::rfc3339};

pub const HEALTH_MESSAGE: &str = "TelyX Backend is running!";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub time: String,
}

/// Handle GET /health
pub async fn health_check(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let _timer = state.metrics.start_timer(Route::Health);
    let parent = state.tracer.extract_parent(&headers);
    let span = state.tracer.start_span("healthCheck", SpanKind::Server, &parent);
    span.set_attribute(KeyValue::new("http.route", Route::Health.as_str()));

    let body = HealthResponse {
        status: "healthy".to_string(),
        message: HEALTH_MESSAGE.to_string(),
        time: rfc3339(Utc::now()),
    };
    let encoded = serde_json::to_vec(&body).map_err(AppError::EncodeHealth);
    state.metrics.increment_request_count(Route::Health);

    match encoded {
        Ok(bytes) => (StatusCode::OK, [(CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Health response could not be encoded");
            span.record_error(&err, err.span_message());
            err.into_response()
        }
    }
}
