//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::models::{CourseForm, COURSE_FIELDS};
use shared::storage::{JsonFileCourseStore, WriteDiscipline};
use shared::telemetry::{InMemorySpanSink, MemoryLogSink, Telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A router over a temporary store with in-memory instrumentation.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub spans: Arc<InMemorySpanSink>,
    pub logs: Arc<MemoryLogSink>,
    pub data_file: PathBuf,
    _dir: TempDir,
}

/// Creates a test app with an empty serialized store.
pub fn test_app() -> TestApp {
    test_app_with(WriteDiscipline::Serialized)
}

/// Creates a test app with an empty store using the given write discipline.
pub fn test_app_with(discipline: WriteDiscipline) -> TestApp {
    let dir = TempDir::new().unwrap();
    let data_file = dir.path().join("course_catalog.json");
    let (telemetry, spans, logs) = Telemetry::in_memory("course-catalog-service");
    let store = Arc::new(JsonFileCourseStore::with_discipline(&data_file, discipline));
    let state = AppState::new(telemetry, store);

    TestApp {
        router: create_router(state.clone()),
        state,
        spans,
        logs,
        data_file,
        _dir: dir,
    }
}

/// Encodes a course form as `application/x-www-form-urlencoded`.
pub fn encode_form(form: &CourseForm) -> String {
    let values = [
        &form.code,
        &form.name,
        &form.instructor,
        &form.semester,
        &form.schedule,
        &form.classroom,
        &form.prerequisites,
        &form.grading,
        &form.description,
    ];
    COURSE_FIELDS
        .iter()
        .zip(values)
        .map(|(field, value)| format!("{field}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Response pieces the tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Returns a header as text, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::HOST, "catalog.test")
            .header(header::USER_AGENT, "integration-test")
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Helper to submit the add-course form.
pub async fn post_course(app: Router, form: &CourseForm) -> TestResponse {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/add_course")
            .header(header::HOST, "catalog.test")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(encode_form(form)))
            .unwrap(),
    )
    .await
}
