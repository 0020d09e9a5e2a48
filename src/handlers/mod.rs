pub mod health;
pub mod logs;
pub mod metrics_handler;

use std::sync::Arc;

use crate::{forwarder::LogForwarder, metrics::MetricsRegistry, telemetry::SpanTracer};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsRegistry>,
    pub tracer: SpanTracer,
    pub forwarder: Arc<LogForwarder>,
}
