use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use opentelemetry::{trace::SpanKind, KeyValue};
use serde_json::json;

use crate::{
    error::{AppError, ForwardError},
    handlers::AppState,
    metrics::Route,
    record::LogRecord,
    telemetry::SpanScope,
};

/// Handle POST /logs
///
/// decode → enrich → re-encode → forward. Whatever the outcome, the request counter is
/// incremented once, one latency observation is made and the span is ended. Body read
/// failures (size limit, aborted upload) are taken as a `Result` so they go through
/// the same path.
pub async fn ingest_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let _timer = state.metrics.start_timer(Route::Logs);
    let parent = state.tracer.extract_parent(&headers);
    let span = state.tracer.start_span("logHandler", SpanKind::Server, &parent);
    span.set_attribute(KeyValue::new("http.route", Route::Logs.as_str()));

    let outcome = match body {
        Ok(body) => ingest(&state, &span, &body).await,
        Err(rejection) => Err(AppError::ReadBody(rejection)),
    };
    state.metrics.increment_request_count(Route::Logs);

    let response = match outcome {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({ "status": "Log successfully ingested" })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(
                route = %Route::Logs,
                status = err.status().as_u16(),
                error = %err,
                "Log ingestion failed"
            );
            span.record_error(&err, err.span_message());
            err.into_response()
        }
    };
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(response.status().as_u16()),
    ));

    response
}

async fn ingest(state: &AppState, span: &SpanScope, body: &[u8]) -> Result<(), AppError> {
    let mut record = LogRecord::decode(body).map_err(AppError::InvalidLogFormat)?;

    if record.ensure_timestamp(Utc::now()) {
        tracing::debug!("Added timestamp to log record");
    }

    let payload = record.to_json().map_err(AppError::MarshalLog)?;

    // The forward runs in its own task so a client hanging up does not cancel it
    let forwarder = state.forwarder.clone();
    let tracer = state.tracer.clone();
    let parent = span.context().clone();
    let forwarded = tokio::spawn(async move {
        let span = tracer.start_span("forwardLog", SpanKind::Client, &parent);
        span.set_attribute(KeyValue::new("server.address", forwarder.endpoint().to_string()));

        let result = forwarder.forward(payload).await;
        if let Err(err) = &result {
            span.record_error(err, "Failed to send log to OpenSearch");
        }
        result
    })
    .await
    .map_err(ForwardError::Interrupted)?;
    forwarded?;

    tracing::debug!(fields = record.field_count(), "Log record forwarded");
    Ok(())
}
