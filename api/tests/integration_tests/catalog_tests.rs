//! Integration tests for the catalog pages.
//!
//! Tests cover:
//! - Adding courses through the form
//! - Listing and looking up courses
//! - Validation, duplicate and not-found replies
//! - The persisted document format

use axum::http::StatusCode;
use shared::models::{Course, CourseForm};

use super::common::{get, post_course, test_app};

#[tokio::test]
async fn test_add_then_list_and_show() {
    let app = test_app();

    let added = post_course(app.router.clone(), &CourseForm::sample("CS101")).await;
    assert_eq!(added.status, StatusCode::SEE_OTHER);
    assert_eq!(added.header("location"), Some("/catalog"));
    assert_eq!(
        added.header("x-flash-message"),
        Some("Course 'Intro' added successfully!")
    );

    let catalog = get(app.router.clone(), "/catalog").await;
    assert_eq!(catalog.body["total_count"], 1);
    assert_eq!(catalog.body["courses"][0]["code"], "CS101");
    assert_eq!(catalog.body["courses"][0]["instructor"], "Dr. Ada");

    let details = get(app.router, "/course/CS101").await;
    assert_eq!(details.status, StatusCode::OK);
    assert_eq!(details.body["course"]["name"], "Intro");
}

#[tokio::test]
async fn test_courses_listed_in_insertion_order() {
    let app = test_app();

    for code in ["MA200", "CS101", "PH150"] {
        post_course(app.router.clone(), &CourseForm::sample(code)).await;
    }

    let catalog = get(app.router, "/catalog").await;
    let codes: Vec<&str> = catalog.body["courses"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["code"].as_str())
        .collect();
    assert_eq!(codes, ["MA200", "CS101", "PH150"]);
}

#[tokio::test]
async fn test_submitted_values_are_trimmed() {
    let app = test_app();
    let mut form = CourseForm::sample("  CS102  ");
    form.name = " Data Structures ".to_string();

    post_course(app.router.clone(), &form).await;

    let stored = app.state.store().find("CS102").unwrap().unwrap();
    assert_eq!(stored.name, "Data Structures");
}

#[tokio::test]
async fn test_blank_field_rerenders_form() {
    let app = test_app();
    let mut form = CourseForm::sample("CS101");
    form.description = String::new();
    form.classroom = "   ".to_string();

    let response = post_course(app.router, &form).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.header("x-flash-category"), Some("warning"));
    assert_eq!(
        response.body["invalid_fields"],
        serde_json::json!(["classroom", "description"])
    );
    assert_eq!(response.body["fields"].as_array().unwrap().len(), 9);
    assert!(!app.data_file.exists());
}

#[tokio::test]
async fn test_duplicate_code_is_rejected() {
    let app = test_app();
    post_course(app.router.clone(), &CourseForm::sample("CS101")).await;

    let mut again = CourseForm::sample("CS101");
    again.name = "Other".to_string();
    let response = post_course(app.router, &again).await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["invalid_fields"][0], "code");
    let stored = app.state.store().load_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Intro");
}

#[tokio::test]
async fn test_unknown_course_redirects_to_catalog() {
    let app = test_app();

    let response = get(app.router, "/course/CS999").await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/catalog"));
    assert_eq!(response.header("x-flash-category"), Some("error"));
    assert_eq!(
        response.header("x-flash-message"),
        Some("No course found with code 'CS999'")
    );
}

#[tokio::test]
async fn test_corrupt_store_redirects_to_index() {
    let app = test_app();
    std::fs::write(&app.data_file, "[{\"code\": ").unwrap();

    let response = get(app.router, "/catalog").await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/"));
    assert_eq!(
        response.header("x-flash-message"),
        Some("Error loading course data")
    );
    // The damaged document is left for inspection
    assert_eq!(
        std::fs::read_to_string(&app.data_file).unwrap(),
        "[{\"code\": "
    );
}

#[tokio::test]
async fn test_persisted_document_format() {
    let app = test_app();

    post_course(app.router, &CourseForm::sample("CS101")).await;

    let raw = std::fs::read_to_string(&app.data_file).unwrap();
    assert!(raw.starts_with("[\n    {\n        \"code\": \"CS101\""));
    let courses: Vec<Course> = serde_json::from_str(&raw).unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].grading, "Letter");
}
