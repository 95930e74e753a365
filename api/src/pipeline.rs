//! Request pipeline.
//!
//! Every catalog operation runs through [`RequestPipeline::run`], which owns
//! the instrumentation choreography:
//!
//! 1. open a server span and record the request attributes before any branching
//! 2. run the operation body, catching panics
//! 3. mark the span `ok` or `error` and set `http.status_code`
//! 4. count errors, record latency where applicable, count the page access
//! 5. close the span and write exactly one application log line
//!
//! Operation bodies only describe what happened (`Success` or `Failure`); they
//! never touch counters, span status or the logger directly.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Serialize;
use serde_json::{json, Value};
use shared::models::{Course, CourseForm, LogLevel, SpanKind, SpanStatus, COURSE_FIELDS};
use shared::storage::{CourseStore, StoreError};
use shared::telemetry::{SpanGuard, Telemetry};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Span attribute holding the HTTP status reported for the operation.
pub const HTTP_STATUS_CODE: &str = "http.status_code";

const MISSING_FIELDS_FLASH: &str = "Please fill all required fields";
const LOAD_ERROR_FLASH: &str = "Error loading course data";

/// The traced operations of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Render the landing page.
    Index,
    /// List every course.
    Catalog,
    /// Render the empty add-course form.
    AddCourseForm,
    /// Validate and store a submitted course.
    AddCourse,
    /// Show one course.
    CourseDetails,
}

impl Operation {
    /// Name of the span opened for the operation.
    #[must_use]
    pub fn span_name(self) -> &'static str {
        match self {
            Self::Index => "index-span",
            Self::Catalog => "catalog-span",
            Self::AddCourseForm | Self::AddCourse => "add-course-span",
            Self::CourseDetails => "course-details-span",
        }
    }

    /// Value of the `page` label on the operation's metrics.
    #[must_use]
    pub fn page(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Catalog => "catalog",
            Self::AddCourseForm | Self::AddCourse => "add_course",
            Self::CourseDetails => "course_details",
        }
    }

    /// Whether the operation records a latency sample.
    #[must_use]
    pub fn records_latency(self) -> bool {
        matches!(self, Self::Catalog | Self::AddCourse)
    }

    fn title(self) -> &'static str {
        match self {
            Self::Index => "Index",
            Self::Catalog => "Course Catalog",
            Self::AddCourseForm | Self::AddCourse => "Add Course",
            Self::CourseDetails => "Course Details",
        }
    }
}

/// Request metadata recorded on every span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Full request URL.
    pub url: String,
    /// Client IP address, or "unknown".
    pub peer_ip: String,
    /// `User-Agent` header, or "Unknown".
    pub user_agent: String,
}

impl RequestInfo {
    /// Creates request metadata.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        peer_ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            peer_ip: peer_ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// Category of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    /// The operation succeeded.
    Success,
    /// The user should correct the submission.
    Warning,
    /// The operation failed.
    Error,
}

impl FlashCategory {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A one-shot message for the user, carried with the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    /// Message category.
    pub category: FlashCategory,
    /// Message text.
    pub message: String,
}

impl Flash {
    /// Creates a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Success,
            message: message.into(),
        }
    }

    /// Creates a warning message.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Warning,
            message: message.into(),
        }
    }

    /// Creates an error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            category: FlashCategory::Error,
            message: message.into(),
        }
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            "x-flash-category",
            HeaderValue::from_static(self.category.as_str()),
        );
        let text: String = self
            .message
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        if let Ok(value) = HeaderValue::from_bytes(text.as_bytes()) {
            headers.insert("x-flash-message", value);
        }
    }
}

/// What the front door sends back.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A JSON document.
    Page {
        /// Response status.
        status: StatusCode,
        /// Response document.
        body: Value,
        /// Optional message for the user.
        flash: Option<Flash>,
    },
    /// A `303 See Other` redirect.
    Redirect {
        /// Redirect target.
        location: &'static str,
        /// Message for the user.
        flash: Flash,
    },
}

impl Reply {
    /// Creates a `200 OK` page.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::Page {
            status: StatusCode::OK,
            body,
            flash: None,
        }
    }

    /// Creates a redirect.
    #[must_use]
    pub fn redirect(location: &'static str, flash: Flash) -> Self {
        Self::Redirect { location, flash }
    }

    /// Returns the HTTP status of the reply.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Page { status, .. } => *status,
            Self::Redirect { .. } => StatusCode::SEE_OTHER,
        }
    }

    /// Returns the flash message, if any.
    #[must_use]
    pub fn flash(&self) -> Option<&Flash> {
        match self {
            Self::Page { flash, .. } => flash.as_ref(),
            Self::Redirect { flash, .. } => Some(flash),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Page {
                status,
                mut body,
                flash,
            } => {
                if let (Some(flash), Some(object)) = (&flash, body.as_object_mut()) {
                    object.insert("flash".to_string(), json!(flash));
                }
                let mut response = (status, Json(body)).into_response();
                if let Some(flash) = flash {
                    flash.apply(response.headers_mut());
                }
                response
            }
            Self::Redirect { location, flash } => {
                let mut response = Redirect::to(location).into_response();
                *response.status_mut() = StatusCode::SEE_OTHER;
                flash.apply(response.headers_mut());
                response
            }
        }
    }
}

/// Successful end of an operation.
#[derive(Debug)]
pub struct Success {
    reply: Reply,
    message: String,
}

impl Success {
    /// A `200 OK` document; `message` is the log line.
    #[must_use]
    pub fn page(body: Value, message: impl Into<String>) -> Self {
        Self {
            reply: Reply::ok(body),
            message: message.into(),
        }
    }

    /// A redirect; `message` is the log line.
    #[must_use]
    pub fn redirect(location: &'static str, flash: Flash, message: impl Into<String>) -> Self {
        Self {
            reply: Reply::redirect(location, flash),
            message: message.into(),
        }
    }
}

/// Class of a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or blank input.
    Validation,
    /// The requested course does not exist.
    NotFound,
    /// The course code is already taken.
    Conflict,
    /// The record store could not be read or written.
    Store,
    /// The operation body panicked.
    Internal,
}

impl FailureKind {
    /// HTTP status recorded on the span for this failure.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Store | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Recoverable failure of an operation.
#[derive(Debug)]
pub struct Failure {
    kind: FailureKind,
    detail: String,
    reply: Reply,
    message: Option<String>,
}

impl Failure {
    /// Creates a failure; `detail` becomes the span event and, unless
    /// overridden, part of the log line.
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>, reply: Reply) -> Self {
        Self {
            kind,
            detail: detail.into(),
            reply,
            message: None,
        }
    }

    /// Overrides the log line.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the failure class.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    fn store(context: &str, error: &StoreError) -> Self {
        Self::new(
            FailureKind::Store,
            format!("{context}: {error}"),
            Reply::redirect("/", Flash::error(context)),
        )
    }

    fn panicked(payload: &(dyn Any + Send)) -> Self {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Self::new(
            FailureKind::Internal,
            format!("Operation panicked: {reason}"),
            Reply::redirect("/", Flash::error("Something went wrong")),
        )
    }
}

/// Result of an operation body.
pub type Outcome = Result<Success, Failure>;

fn form_reply(status: StatusCode, flash: Flash, invalid_fields: &[String]) -> Reply {
    Reply::Page {
        status,
        body: json!({
            "fields": COURSE_FIELDS,
            "invalid_fields": invalid_fields,
        }),
        flash: Some(flash),
    }
}

/// Runs catalog operations against the store with full instrumentation.
pub struct RequestPipeline {
    telemetry: Telemetry,
    store: Arc<dyn CourseStore>,
}

impl RequestPipeline {
    /// Creates a pipeline over the given instrumentation and store.
    #[must_use]
    pub fn new(telemetry: Telemetry, store: Arc<dyn CourseStore>) -> Self {
        Self { telemetry, store }
    }

    /// Returns the instrumentation context.
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &dyn CourseStore {
        self.store.as_ref()
    }

    /// Runs one operation body inside the instrumentation choreography.
    ///
    /// Whatever the body returns (or if it panics), exactly one span is
    /// closed, one page access is counted and one log line is written. The
    /// log line carries the caller's source location.
    #[track_caller]
    pub fn run<F>(&self, operation: Operation, request: &RequestInfo, body: F) -> Reply
    where
        F: FnOnce(&mut SpanGuard) -> Outcome,
    {
        let started = Instant::now();
        let page = [("page", operation.page())];

        let mut span = self
            .telemetry
            .tracer
            .start(operation.span_name(), SpanKind::Server);
        span.set_attribute("http.method", &request.method);
        span.set_attribute("http.url", &request.url);
        span.set_attribute("peer.ip", &request.peer_ip);
        span.set_attribute("http.user_agent", &request.user_agent);

        let outcome = catch_unwind(AssertUnwindSafe(|| body(&mut span)))
            .unwrap_or_else(|payload| Err(Failure::panicked(payload.as_ref())));

        let (reply, level, message) = match outcome {
            Ok(success) => {
                span.set_status(SpanStatus::Ok);
                span.set_attribute(HTTP_STATUS_CODE, success.reply.status().as_u16());
                (success.reply, LogLevel::Info, success.message)
            }
            Err(failure) => {
                span.add_event(failure.detail.as_str());
                span.set_status(SpanStatus::Error);
                span.set_attribute(HTTP_STATUS_CODE, failure.kind.status_code().as_u16());
                self.telemetry.metrics.error_counter.add(1, &page);
                let message = failure.message.unwrap_or_else(|| {
                    format!("{} failed: {}", operation.title(), failure.detail)
                });
                (failure.reply, LogLevel::Error, message)
            }
        };

        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        span.end();

        if operation.records_latency() {
            self.telemetry.metrics.timing_histogram.record(elapsed, &page);
        }
        self.telemetry.metrics.page_access_counter.add(1, &page);
        self.telemetry.logger.log(level, message);

        reply
    }

    /// Renders the landing page.
    pub fn index(&self, request: &RequestInfo) -> Reply {
        self.run(Operation::Index, request, |span| {
            span.add_event("Rendered Course Information Index Page");
            Ok(Success::page(
                json!({
                    "service": self.telemetry.tracer.service(),
                    "version": env!("CARGO_PKG_VERSION"),
                    "links": {
                        "catalog": "/catalog",
                        "add_course": "/add_course",
                        "course": "/course/{code}",
                    },
                }),
                "Page Rendered: Index",
            ))
        })
    }

    /// Lists every course.
    pub fn course_catalog(&self, request: &RequestInfo) -> Reply {
        self.run(Operation::Catalog, request, |span| {
            let courses = self
                .load_courses(span)
                .map_err(|e| Failure::store(LOAD_ERROR_FLASH, &e))?;

            span.add_event(format!("Listed {} courses", courses.len()));
            Ok(Success::page(
                json!({
                    "total_count": courses.len(),
                    "courses": courses,
                }),
                "Page Rendered: Course Catalog",
            ))
        })
    }

    /// Renders the empty add-course form.
    pub fn add_course_form(&self, request: &RequestInfo) -> Reply {
        self.run(Operation::AddCourseForm, request, |span| {
            span.add_event("Rendered Add Course Form");
            Ok(Success::page(
                json!({ "fields": COURSE_FIELDS }),
                "Page Rendered: Add Course",
            ))
        })
    }

    /// Validates and stores a submitted course.
    ///
    /// `form` is `Err` with a description when the submission could not be
    /// decoded at all.
    pub fn add_course(&self, request: &RequestInfo, form: Result<CourseForm, String>) -> Reply {
        self.run(Operation::AddCourse, request, |span| {
            let form = form.map_err(|reason| {
                Failure::new(
                    FailureKind::Validation,
                    format!("Malformed course form: {reason}"),
                    form_reply(
                        StatusCode::BAD_REQUEST,
                        Flash::warning(MISSING_FIELDS_FLASH),
                        &[],
                    ),
                )
            })?;

            let course = form.into_course().map_err(|e| {
                Failure::new(
                    FailureKind::Validation,
                    e.to_string(),
                    form_reply(
                        StatusCode::BAD_REQUEST,
                        Flash::warning(MISSING_FIELDS_FLASH),
                        e.fields(),
                    ),
                )
            })?;

            let code = course.code.clone();
            let name = course.name.clone();
            span.set_attribute("course.code", &code);

            self.save_course(span, course).map_err(|e| match e {
                StoreError::DuplicateCode(code) => Failure::new(
                    FailureKind::Conflict,
                    format!("Duplicate course code {code}"),
                    form_reply(
                        StatusCode::CONFLICT,
                        Flash::warning(format!("A course with code '{code}' already exists")),
                        &["code".to_string()],
                    ),
                ),
                other => Failure::store("Error saving course data", &other),
            })?;

            self.telemetry
                .metrics
                .new_course_counter
                .add(1, &[("page", Operation::AddCourse.page())]);
            span.add_event(format!("Added course {code}"));

            Ok(Success::redirect(
                "/catalog",
                Flash::success(format!("Course '{name}' added successfully!")),
                format!("Course Added: {code} {name}"),
            ))
        })
    }

    /// Shows the course with the given code.
    pub fn course_details(&self, request: &RequestInfo, code: &str) -> Reply {
        self.run(Operation::CourseDetails, request, |span| {
            span.set_attribute("course.code", code);

            let courses = self
                .load_courses(span)
                .map_err(|e| Failure::store(LOAD_ERROR_FLASH, &e))?;

            let Some(course) = courses.into_iter().find(|c| c.code == code) else {
                let not_found = format!("No course found with code '{code}'");
                return Err(Failure::new(
                    FailureKind::NotFound,
                    not_found.clone(),
                    Reply::redirect("/catalog", Flash::error(not_found)),
                )
                .with_message(format!("Course {code} Not Found")));
            };

            span.add_event(format!("Loaded course {code}"));
            Ok(Success::page(
                json!({ "course": course }),
                format!("Page Rendered: Course Details - {code}"),
            ))
        })
    }

    fn load_courses(&self, parent: &SpanGuard) -> Result<Vec<Course>, StoreError> {
        let mut span = parent.child("load-courses-span", SpanKind::Internal);
        match self.store.load_all() {
            Ok(courses) => {
                span.add_event("Loaded Courses from JSON file");
                span.set_attribute("catalog.course_count", courses.len());
                span.set_status(SpanStatus::Ok);
                Ok(courses)
            }
            Err(e) => {
                span.add_event(format!("Failed to load courses: {e}"));
                span.set_status(SpanStatus::Error);
                Err(e)
            }
        }
    }

    fn save_course(&self, parent: &SpanGuard, course: Course) -> Result<(), StoreError> {
        let mut span = parent.child("save-course-span", SpanKind::Internal);
        match self.store.append(course) {
            Ok(()) => {
                span.add_event("Saved course to JSON file");
                span.set_status(SpanStatus::Ok);
                Ok(())
            }
            Err(e) => {
                span.add_event(format!("Failed to save course: {e}"));
                span.set_status(SpanStatus::Error);
                Err(e)
            }
        }
    }
}
