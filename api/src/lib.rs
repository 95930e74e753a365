//! Course Catalog API Server
//!
//! This crate provides the HTTP server for the course catalog. Every catalog
//! operation is traced, counted and logged through the request pipeline.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - Catalog routes (`/`, `/catalog`, `/add_course`, `/course/{code}`)
//! - Diagnostic routes (`/health`, `/metrics`, `/manual-trace`, `/auto-instrumented`)
//! - Background span export and periodic metric reporting
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod metrics;
pub mod pipeline;
mod routes;
mod state;

pub use config::{Config, LogFormat};
pub use pipeline::{Operation, Reply, RequestInfo, RequestPipeline};
pub use routes::MetricsResponse;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use crate::metrics::MetricsReporter;
use shared::storage::JsonFileCourseStore;
use shared::telemetry::{
    BatchSpanProcessor, ConsoleSpanExporter, FileLogSink, MetricsRegistry, StructuredLogger,
    Telemetry, Tracer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Runs the course catalog server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the course catalog server with the provided configuration.
///
/// Spans are exported in batches by a background task; queued spans are
/// flushed before this function returns.
///
/// # Errors
///
/// Returns an error if:
/// - The configured address is invalid or cannot be bound
/// - The application log file cannot be opened
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        data_file = %config.data_file.display(),
        log_file = %config.log_file.display(),
        store_writes = %config.store_writes,
        "Course catalog server starting"
    );

    let log_sink = FileLogSink::open(&config.log_file).with_context(|| {
        format!(
            "Failed to open application log {}",
            config.log_file.display()
        )
    })?;
    let (processor, export_task) =
        BatchSpanProcessor::spawn(Arc::new(ConsoleSpanExporter), config.span_batch.clone());

    let telemetry = Telemetry::new(
        Tracer::new(&config.service_name, processor.clone()),
        Arc::new(MetricsRegistry::new()),
        Arc::new(StructuredLogger::new(&config.logger_name, Arc::new(log_sink))),
    );
    let store = Arc::new(JsonFileCourseStore::with_discipline(
        &config.data_file,
        config.store_writes,
    ));

    let reporter = Arc::new(MetricsReporter::new(
        Arc::clone(&telemetry.metrics),
        config.metrics_interval,
    ));
    let reporter_task = tokio::spawn(Arc::clone(&reporter).run());

    let state = AppState::new(telemetry, store);
    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, "Listening for connections");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    reporter_task.abort();
    reporter.report();

    processor.shutdown();
    if let Err(e) = export_task.await {
        tracing::error!(error = %e, "Span export task failed");
    }
    tracing::info!(
        dropped_spans = processor.dropped_count(),
        "Span export finished"
    );

    served?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::catalog_routes(state.clone()))
        .merge(routes::diagnostics_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
