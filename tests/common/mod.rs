#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use telyx_backend::{
    forwarder::LogForwarder, handlers::AppState, metrics::MetricsRegistry, server::create_router,
    telemetry::TraceProvider,
};
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use tower::ServiceExt;

/// Nothing listens on port 1
pub const UNREACHABLE_STORE: &str = "http://127.0.0.1:1/logs/_doc";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Kept alive for the duration of the test
    pub provider: TraceProvider,
}

impl TestApp {
    pub fn new(store_url: &str) -> Self {
        Self::with_provider(store_url, TraceProvider::local(1.0))
    }

    /// App whose sampled spans are collected in the returned exporter
    pub fn with_span_exporter(store_url: &str) -> (Self, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = TraceProvider::with_exporter(1.0, exporter.clone());
        (Self::with_provider(store_url, provider), exporter)
    }

    fn with_provider(store_url: &str, provider: TraceProvider) -> Self {
        let state = AppState {
            metrics: Arc::new(MetricsRegistry::new().unwrap()),
            tracer: provider.tracer(),
            forwarder: Arc::new(LogForwarder::new(reqwest::Client::new(), store_url)),
        };
        Self {
            router: create_router(state.clone()),
            state,
            provider,
        }
    }

    pub async fn post_logs(&self, body: impl Into<Body>) -> (StatusCode, serde_json::Value) {
        let request = Request::post("/logs")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Current value of one exposition series, 0 when it has not been rendered yet
    pub async fn scrape(&self, series: &str) -> f64 {
        let (_, text) = self.get("/metrics").await;
        sample(&text, series)
    }
}

pub fn sample(rendered: &str, series: &str) -> f64 {
    rendered
        .lines()
        .find_map(|line| line.strip_prefix(series))
        .and_then(|rest| rest.trim().parse().ok())
        .unwrap_or(0.0)
}

pub const LOGS_COUNTER: &str = r#"http_requests_total{path="/logs"}"#;
pub const LOGS_LATENCY_COUNT: &str = r#"http_request_duration_seconds_count{path="/logs"}"#;
pub const HEALTH_COUNTER: &str = r#"http_requests_total{path="/health"}"#;
pub const HEALTH_LATENCY_COUNT: &str = r#"http_request_duration_seconds_count{path="/health"}"#;
