use anyhow::{Context as _, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    forwarder::LogForwarder,
    handlers::{self, AppState},
    metrics::MetricsRegistry,
    signals::setup_signal_handlers,
    telemetry::TraceProvider,
};

/// Start the ingestion server
///
/// This function:
/// 1. Builds the metrics registry and the trace provider
/// 2. Creates the Axum application around them
/// 3. Binds to the configured address, then installs the signal handlers
/// 4. Serves requests until SIGTERM/SIGINT
/// 5. Flushes pending spans, also when serving fails
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics registry")?);

    info!("Initializing trace provider...");
    let mut trace_provider =
        TraceProvider::init(&config.tracing).context("Failed to initialize tracer")?;

    let forwarder = Arc::new(LogForwarder::new(
        reqwest::Client::new(),
        config.store.url.clone(),
    ));

    let state = AppState {
        metrics,
        tracer: trace_provider.tracer(),
        forwarder,
    };
    let app = create_router(state);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    info!("Server is running on {}", addr);
    info!(store = %config.store.url, "Forwarding logs to document store");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await;

    signal_handle.abort();
    trace_provider.shutdown();

    served?;
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/logs", post(handlers::logs::ingest_log))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}
