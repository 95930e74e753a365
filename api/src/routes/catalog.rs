//! Course catalog endpoints.
//!
//! Thin adapters from HTTP to the request pipeline. Every operation runs on
//! the blocking pool since the record store does synchronous file I/O.

use crate::pipeline::{Flash, Reply, RequestInfo, RequestPipeline};
use crate::state::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Form, Router};
use shared::models::CourseForm;
use std::sync::Arc;

/// Creates the catalog routes.
pub fn catalog_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/catalog", get(course_catalog))
        .route("/add_course", get(add_course_form).post(add_course))
        .route("/course/{code}", get(course_details))
        .with_state(state)
}

async fn run_blocking<F>(state: &AppState, operation: F) -> Reply
where
    F: FnOnce(&RequestPipeline) -> Reply + Send + 'static,
{
    let pipeline = Arc::clone(state.pipeline());
    match tokio::task::spawn_blocking(move || operation(&pipeline)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, "Catalog operation task failed");
            Reply::redirect("/", Flash::error("Something went wrong"))
        }
    }
}

async fn index(State(state): State<AppState>, request: RequestInfo) -> Reply {
    run_blocking(&state, move |pipeline| pipeline.index(&request)).await
}

async fn course_catalog(State(state): State<AppState>, request: RequestInfo) -> Reply {
    run_blocking(&state, move |pipeline| pipeline.course_catalog(&request)).await
}

async fn add_course_form(State(state): State<AppState>, request: RequestInfo) -> Reply {
    run_blocking(&state, move |pipeline| pipeline.add_course_form(&request)).await
}

async fn add_course(
    State(state): State<AppState>,
    request: RequestInfo,
    form: Result<Form<CourseForm>, FormRejection>,
) -> Reply {
    let form = form.map(|Form(form)| form).map_err(|e| e.body_text());
    run_blocking(&state, move |pipeline| pipeline.add_course(&request, form)).await
}

async fn course_details(
    State(state): State<AppState>,
    Path(code): Path<String>,
    request: RequestInfo,
) -> Reply {
    run_blocking(&state, move |pipeline| {
        pipeline.course_details(&request, &code)
    })
    .await
}
