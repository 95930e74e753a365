//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::pipeline::RequestPipeline;
use shared::storage::CourseStore;
use shared::telemetry::Telemetry;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the request pipeline, which in turn owns the record store and the
/// instrumentation context. Cloning shares both.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RequestPipeline>,
}

impl AppState {
    /// Creates a new application state over the given instrumentation and store.
    #[must_use]
    pub fn new(telemetry: Telemetry, store: Arc<dyn CourseStore>) -> Self {
        Self {
            pipeline: Arc::new(RequestPipeline::new(telemetry, store)),
        }
    }

    /// Returns the request pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Returns the instrumentation context.
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        self.pipeline.telemetry()
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &dyn CourseStore {
        self.pipeline.store()
    }
}
