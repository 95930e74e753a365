//! API route definitions.
//!
//! This module organizes all HTTP routes for the course catalog service.

mod catalog;
mod diagnostics;
mod health;
mod request_info;

pub use catalog::catalog_routes;
pub use diagnostics::{diagnostics_routes, MetricsResponse};
pub use health::health_routes;
