//! Integration tests for request instrumentation.
//!
//! Tests cover:
//! - One closed root span per catalog request, on every exit path
//! - Counter totals matching what clients saw
//! - One application log record per request
//! - Concurrent submissions

use shared::models::{CourseForm, LogLevel, Span, SpanStatus};
use futures::future::join_all;
use shared::storage::WriteDiscipline;

use super::common::{get, post_course, test_app, test_app_with};

fn roots(spans: &[Span]) -> Vec<&Span> {
    spans.iter().filter(|s| s.is_root()).collect()
}

#[tokio::test]
async fn test_request_attributes_recorded() {
    let app = test_app();

    get(app.router, "/catalog").await;

    let spans = app.spans.spans();
    let root = roots(&spans)[0];
    assert_eq!(root.name, "catalog-span");
    assert_eq!(root.service, "course-catalog-service");
    assert_eq!(root.attribute_str("http.method"), Some("GET"));
    assert_eq!(root.attribute_str("http.url"), Some("http://catalog.test/catalog"));
    assert_eq!(root.attribute_str("http.user_agent"), Some("integration-test"));
    assert_eq!(root.attribute_str("peer.ip"), Some("unknown"));
    assert_eq!(root.attributes["http.status_code"], 200);
}

#[tokio::test]
async fn test_every_exit_path_closes_one_span() {
    let app = test_app();
    let mut blank = CourseForm::sample("CS102");
    blank.name = String::new();

    get(app.router.clone(), "/").await;
    get(app.router.clone(), "/add_course").await;
    post_course(app.router.clone(), &CourseForm::sample("CS101")).await;
    post_course(app.router.clone(), &blank).await;
    post_course(app.router.clone(), &CourseForm::sample("CS101")).await;
    get(app.router.clone(), "/catalog").await;
    get(app.router.clone(), "/course/CS101").await;
    get(app.router.clone(), "/course/NOPE").await;

    let spans = app.spans.spans();
    let roots = roots(&spans);
    assert_eq!(roots.len(), 8);

    let statuses: Vec<SpanStatus> = roots.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        [
            SpanStatus::Ok,
            SpanStatus::Ok,
            SpanStatus::Ok,
            SpanStatus::Error,
            SpanStatus::Error,
            SpanStatus::Ok,
            SpanStatus::Ok,
            SpanStatus::Error,
        ]
    );

    let metrics = &app.state.telemetry().metrics;
    assert_eq!(metrics.page_access_counter.total(), 8);
    assert_eq!(metrics.error_counter.total(), 3);
    assert_eq!(metrics.new_course_counter.total(), 1);
    assert_eq!(metrics.error_counter.get(&[("page", "add_course")]), 2);
    assert_eq!(metrics.error_counter.get(&[("page", "course_details")]), 1);
    // Only the catalog listing and course submissions are timed
    assert_eq!(metrics.timing_histogram.total_count(), 4);
}

#[tokio::test]
async fn test_child_spans_share_the_trace() {
    let app = test_app();

    post_course(app.router, &CourseForm::sample("CS101")).await;

    let spans = app.spans.spans();
    let root = roots(&spans)[0];
    let save = &app.spans.spans_named("save-course-span")[0];
    assert_eq!(save.trace_id, root.trace_id);
    assert_eq!(save.parent_span_id.as_deref(), Some(root.span_id.as_str()));
    assert_eq!(save.status, SpanStatus::Ok);
    assert!(save.has_event("Saved course to JSON file"));
}

#[tokio::test]
async fn test_one_log_record_per_request() {
    let app = test_app();

    get(app.router.clone(), "/").await;
    post_course(app.router.clone(), &CourseForm::sample("CS101")).await;
    get(app.router.clone(), "/course/CS101").await;
    get(app.router.clone(), "/course/CS404").await;
    get(app.router.clone(), "/health").await;
    get(app.router, "/auto-instrumented").await;

    let records = app.logs.records();
    let messages: Vec<&str> = records.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(
        messages,
        [
            "Page Rendered: Index",
            "Course Added: CS101 Intro",
            "Page Rendered: Course Details - CS101",
            "Course CS404 Not Found",
        ]
    );
    assert_eq!(records[3].level, LogLevel::Error);
    assert!(records
        .iter()
        .all(|r| r.logger == "course-catalog-service" && r.line > 0));
}

#[tokio::test]
async fn test_concurrent_submissions_are_all_stored() {
    let app = test_app_with(WriteDiscipline::Serialized);

    let handles = (0..8).map(|i| {
        let router = app.router.clone();
        tokio::spawn(async move {
            post_course(router, &CourseForm::sample(&format!("CS{i:03}"))).await
        })
    });
    let responses: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert!(responses.iter().all(|r| r.status.is_redirection()));
    assert_eq!(app.state.store().load_all().unwrap().len(), 8);
    assert_eq!(app.state.telemetry().metrics.new_course_counter.total(), 8);
}

#[tokio::test]
async fn test_unserialized_submissions_keep_at_least_one() {
    let app = test_app_with(WriteDiscipline::Unserialized);

    let first = CourseForm::sample("CS101");
    let second = CourseForm::sample("CS102");
    let (a, b) = tokio::join!(
        post_course(app.router.clone(), &first),
        post_course(app.router.clone(), &second),
    );

    assert!(a.status.is_redirection() && b.status.is_redirection());
    let stored = app.state.store().load_all().unwrap();
    assert!(!stored.is_empty() && stored.len() <= 2);
}
