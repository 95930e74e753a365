//! Diagnostic endpoints.
//!
//! Pull access to the metric registry, plus two probes showing manual span
//! creation next to the request tracing done by the HTTP layer.

use crate::pipeline::RequestInfo;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use shared::models::{Metric, SpanKind, SpanStatus};

/// Snapshot of the process metrics.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// One entry per instrument series.
    pub metrics: Vec<Metric>,
    /// Application log records that could not be written.
    pub log_faults: u64,
}

/// Creates the diagnostic routes.
pub fn diagnostics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_snapshot))
        .route("/manual-trace", get(manual_trace))
        .route("/auto-instrumented", get(auto_instrumented))
        .with_state(state)
}

async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsResponse> {
    let telemetry = state.telemetry();
    Json(MetricsResponse {
        metrics: telemetry.metrics.snapshot(),
        log_faults: telemetry.logger.fault_count(),
    })
}

async fn manual_trace(State(state): State<AppState>, request: RequestInfo) -> &'static str {
    let mut span = state
        .telemetry()
        .tracer
        .start("manual-span", SpanKind::Server);
    span.set_attribute("http.method", &request.method);
    span.set_attribute("http.url", &request.url);
    span.add_event("Processing request");
    span.set_status(SpanStatus::Ok);
    "Manual trace recorded!"
}

/// Covered only by the HTTP tracing layer.
async fn auto_instrumented() -> &'static str {
    "This route is auto-instrumented!"
}
