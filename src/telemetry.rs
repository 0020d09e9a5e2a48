//! Distributed tracing.
//!
//! A [`TraceProvider`] is built once by the entry point and owns the span pipeline:
//! a `ParentBased(TraceIdRatioBased)` sampler and, when export is enabled, a batch
//! processor pushing spans to an OTLP/HTTP collector. Handlers only see the cheap
//! [`SpanTracer`] handle and the [`SpanScope`] guards it hands out.
//!
//! Export is best-effort: a full queue drops spans and export errors never reach the
//! request path.

use axum::http::HeaderMap;
use opentelemetry::{
    propagation::{Extractor, TextMapPropagator},
    trace::{SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _},
    Context, KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    export::trace::SpanExporter,
    propagation::TraceContextPropagator,
    runtime,
    trace::{BatchConfigBuilder, BatchSpanProcessor, Sampler, Tracer, TracerProvider},
    Resource,
};
use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TracingConfig;

pub const DEFAULT_SERVICE_NAME: &str = "telyx-backend";

fn sampler(ratio: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(ratio)))
}

/// Owner of the process span pipeline
pub struct TraceProvider {
    provider: Option<TracerProvider>,
    tracer: Tracer,
}

impl TraceProvider {
    /// Build the provider described by `cfg`
    ///
    /// Fails only if the OTLP exporter cannot be constructed.
    pub fn init(cfg: &TracingConfig) -> anyhow::Result<Self> {
        if !cfg.enabled {
            info!("Span export disabled, spans will be sampled but not exported");
            return Ok(Self::from_provider(
                TracerProvider::builder()
                    .with_sampler(sampler(cfg.sampling_ratio))
                    .with_resource(resource(&cfg.service_name))
                    .build(),
                &cfg.service_name,
            ));
        }

        let export_timeout = Duration::from_millis(cfg.export_timeout_ms);
        let mut exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_timeout(export_timeout);
        if let Some(endpoint) = &cfg.otlp_endpoint {
            exporter = exporter.with_endpoint(endpoint.clone());
        }
        let exporter = exporter
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create OTLP trace exporter: {}", e))?;

        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(cfg.max_queue_size)
            .with_max_export_batch_size(cfg.max_export_batch_size)
            .with_scheduled_delay(Duration::from_millis(cfg.scheduled_delay_ms))
            .with_max_export_timeout(export_timeout)
            .build();
        let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
            .with_batch_config(batch_config)
            .build();

        let provider = TracerProvider::builder()
            .with_span_processor(processor)
            .with_sampler(sampler(cfg.sampling_ratio))
            .with_resource(resource(&cfg.service_name))
            .build();

        info!(
            service = %cfg.service_name,
            endpoint = cfg.otlp_endpoint.as_deref().unwrap_or("<env default>"),
            sampling_ratio = cfg.sampling_ratio,
            "OpenTelemetry trace provider initialized"
        );

        Ok(Self::from_provider(provider, &cfg.service_name))
    }

    /// Provider with the production sampler and no exporter
    pub fn local(sampling_ratio: f64) -> Self {
        Self::from_provider(
            TracerProvider::builder()
                .with_sampler(sampler(sampling_ratio))
                .build(),
            DEFAULT_SERVICE_NAME,
        )
    }

    /// Provider with the production sampler exporting every ended span to `exporter`
    /// synchronously
    pub fn with_exporter<E>(sampling_ratio: f64, exporter: E) -> Self
    where
        E: SpanExporter + 'static,
    {
        Self::from_provider(
            TracerProvider::builder()
                .with_simple_exporter(exporter)
                .with_sampler(sampler(sampling_ratio))
                .build(),
            DEFAULT_SERVICE_NAME,
        )
    }

    fn from_provider(provider: TracerProvider, service_name: &str) -> Self {
        let tracer = provider.tracer(service_name.to_string());
        Self {
            provider: Some(provider),
            tracer,
        }
    }

    pub fn tracer(&self) -> SpanTracer {
        SpanTracer {
            tracer: self.tracer.clone(),
        }
    }

    /// Flush queued spans and stop the exporter. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                warn!(error = %e, "Trace provider shutdown did not complete cleanly");
            } else {
                info!("Trace provider flushed and shut down");
            }
        }
    }
}

impl Drop for TraceProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resource(service_name: &str) -> Resource {
    Resource::new(vec![KeyValue::new("service.name", service_name.to_string())])
}

/// Handle used by request handlers to open spans
///
/// Spans started after the owning [`TraceProvider`] is dropped or shut down are
/// non-recording, so the provider must outlive every handle.
#[derive(Clone)]
pub struct SpanTracer {
    tracer: Tracer,
}

impl SpanTracer {
    /// Parent context carried by a W3C `traceparent` header, or an empty root context
    pub fn extract_parent(&self, headers: &HeaderMap) -> Context {
        TraceContextPropagator::new().extract_with_context(&Context::new(), &HeaderExtractor(headers))
    }

    /// Start a span under `parent`; the sampling decision is taken here
    pub fn start_span(&self, name: &'static str, kind: SpanKind, parent: &Context) -> SpanScope {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(kind)
            .start_with_context(&self.tracer, parent);
        SpanScope {
            cx: parent.with_span(span),
        }
    }
}

/// An open span together with the context that makes it the active parent
///
/// The span is ended when the scope is dropped. Every call is a no-op on unsampled spans.
#[must_use = "the span ends as soon as the scope is dropped"]
pub struct SpanScope {
    cx: Context,
}

impl SpanScope {
    /// Context to start child spans from
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn is_sampled(&self) -> bool {
        self.cx.span().span_context().is_sampled()
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Record `err` as an exception event and mark the span failed with `message`
    pub fn record_error(&self, err: &dyn Error, message: &'static str) {
        let span = self.cx.span();
        span.record_error(err);
        span.set_attribute(KeyValue::new("exception.message", message));
        span.set_status(Status::error(message));
    }

    /// Ends the span now; dropping the scope does the same.
    pub fn end(self) {}
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}
