use metrics::{Counter, Histogram, Key, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::time::Instant;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const BUILD_INFO: &str = "telyx_backend_info";

/// Prometheus client default buckets, in seconds
pub const DEFAULT_LATENCY_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Routes that carry request metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Logs,
    Health,
}

impl Route {
    pub const ALL: [Route; 2] = [Route::Logs, Route::Health];

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Logs => "/logs",
            Route::Health => "/health",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counter and latency histogram of one route
#[derive(Clone)]
pub struct RouteMetric {
    requests: Counter,
    latency: Histogram,
}

/// Per-route request metrics backed by a private Prometheus recorder
///
/// The recorder is never installed globally, so several registries can live side by side
/// (one per server, one per test).
pub struct MetricsRegistry {
    handle: PrometheusHandle,
    logs: RouteMetric,
    health: RouteMetric,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
                &DEFAULT_LATENCY_BUCKETS,
            )?
            .build_recorder();

        recorder.describe_counter(
            REQUESTS_TOTAL.into(),
            None,
            SharedString::const_str("Total number of HTTP requests"),
        );
        recorder.describe_histogram(
            REQUEST_DURATION_SECONDS.into(),
            Some(Unit::Seconds),
            SharedString::const_str("Histogram of response time for HTTP requests"),
        );
        recorder.describe_gauge(
            BUILD_INFO.into(),
            None,
            SharedString::const_str("Backend version information"),
        );

        let register = |route: Route| {
            let labels = vec![Label::new("path", route.as_str())];
            RouteMetric {
                requests: recorder
                    .register_counter(&Key::from_parts(REQUESTS_TOTAL, labels.clone()), &METADATA),
                latency: recorder.register_histogram(
                    &Key::from_parts(REQUEST_DURATION_SECONDS, labels),
                    &METADATA,
                ),
            }
        };
        let logs = register(Route::Logs);
        let health = register(Route::Health);

        recorder
            .register_gauge(
                &Key::from_parts(
                    BUILD_INFO,
                    vec![Label::new("version", env!("CARGO_PKG_VERSION"))],
                ),
                &METADATA,
            )
            .set(1.0);

        Ok(Self {
            handle: recorder.handle(),
            logs,
            health,
        })
    }

    fn route(&self, route: Route) -> &RouteMetric {
        match route {
            Route::Logs => &self.logs,
            Route::Health => &self.health,
        }
    }

    pub fn increment_request_count(&self, route: Route) {
        self.route(route).requests.increment(1);
    }

    pub fn observe_latency(&self, route: Route, duration_seconds: f64) {
        self.route(route).latency.record(duration_seconds);
    }

    /// Start measuring a request; the observation is made when the timer is dropped
    pub fn start_timer(&self, route: Route) -> RequestTimer {
        RequestTimer {
            latency: self.route(route).latency.clone(),
            start: Instant::now(),
        }
    }

    /// Render every metric in Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Observes the elapsed request time exactly once, on whichever path the handler exits
#[must_use = "the latency is observed when the timer is dropped"]
pub struct RequestTimer {
    latency: Histogram,
    start: Instant,
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.latency.record(self.start.elapsed().as_secs_f64());
    }
}
