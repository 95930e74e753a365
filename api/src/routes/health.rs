//! Health check endpoint.
//!
//! Reports whether the course store can be read, for load balancers and
//! monitoring systems. The check is not traced and not counted.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" when the store is readable, "degraded" otherwise.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Number of stored courses, when the store is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courses: Option<usize>,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pipeline = std::sync::Arc::clone(state.pipeline());
    let loaded = tokio::task::spawn_blocking(move || pipeline.store().load_all().map(|c| c.len()))
        .await;

    let (status, courses) = match loaded {
        Ok(Ok(count)) => (StatusCode::OK, Some(count)),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check could not read the course store");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check task failed");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK {
            "healthy"
        } else {
            "degraded"
        },
        service: "course-catalog-api",
        version: env!("CARGO_PKG_VERSION"),
        courses,
    };
    (status, Json(body))
}
