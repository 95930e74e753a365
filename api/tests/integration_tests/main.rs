//! Integration tests for the course catalog API.
//!
//! These tests drive the complete router and verify what a client sees
//! together with the spans, metrics and log records each request leaves
//! behind.

mod catalog_tests;
mod common;
mod health_tests;
mod instrumentation_tests;
