//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint
//! - Empty store behavior
//! - Diagnostic probes

use axum::http::StatusCode;

use super::common::{get, test_app};

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let response = get(app.router, "/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["service"], "course-catalog-api");
    assert_eq!(response.body["courses"], 0);
}

#[tokio::test]
async fn test_empty_store_returns_empty_catalog() {
    let app = test_app();

    let response = get(app.router.clone(), "/catalog").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_count"], 0);
    assert!(response.body["courses"].as_array().unwrap().is_empty());

    // Reading never creates the backing file
    assert!(!app.data_file.exists());
}

#[tokio::test]
async fn test_metrics_endpoint_reflects_requests() {
    let app = test_app();

    get(app.router.clone(), "/").await;
    get(app.router.clone(), "/catalog").await;
    let response = get(app.router, "/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let metrics = response.body["metrics"].as_array().unwrap();
    let page_accesses: u64 = metrics
        .iter()
        .filter(|m| m["name"] == "page_access_counter")
        .filter_map(|m| m["value"].as_u64())
        .sum();
    assert_eq!(page_accesses, 2);
    assert!(metrics.iter().any(|m| m["name"] == "timing_histogram"
        && m["labels"]["page"] == "catalog"
        && m["value"]["count"] == 1));
    assert_eq!(response.body["log_faults"], 0);
}

#[tokio::test]
async fn test_manual_trace_probe() {
    let app = test_app();

    let response = get(app.router, "/manual-trace").await;

    assert_eq!(response.status, StatusCode::OK);
    let span = &app.spans.spans_named("manual-span")[0];
    assert_eq!(span.attribute_str("http.url"), Some("http://catalog.test/manual-trace"));
    assert!(span.has_event("Processing request"));
}
