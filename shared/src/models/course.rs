//! Course catalog entry model.
//!
//! Defines the `Course` record persisted by the record store and the
//! `CourseForm` used to validate submitted fields before a course is created.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Names of the fields every course must carry, in display order.
pub const COURSE_FIELDS: [&str; 9] = [
    "code",
    "name",
    "instructor",
    "semester",
    "schedule",
    "classroom",
    "prerequisites",
    "grading",
    "description",
];

/// A single catalog entry.
///
/// Courses are immutable once created. `code` identifies a course; the
/// serialized store is the only place they live.
///
/// # Example
///
/// ```
/// use shared::models::CourseForm;
///
/// let course = CourseForm::sample("CS101").into_course().unwrap();
/// assert_eq!(course.code, "CS101");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Unique course code (e.g., "CS101").
    pub code: String,
    /// Course title.
    pub name: String,
    /// Instructor teaching the course.
    pub instructor: String,
    /// Semester the course is offered in.
    pub semester: String,
    /// Meeting schedule.
    pub schedule: String,
    /// Room the course is held in.
    pub classroom: String,
    /// Required prior courses.
    pub prerequisites: String,
    /// Grading scheme.
    pub grading: String,
    /// Free-form description.
    pub description: String,
}

/// Errors raised when a submitted course form is incomplete.
#[derive(Debug, Error)]
pub enum CourseValidationError {
    /// One or more required fields were empty or whitespace-only.
    #[error("Please fill all required fields (missing: {})", .0.join(", "))]
    MissingFields(Vec<String>),
}

impl CourseValidationError {
    /// Returns the offending field names, sorted in display order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        match self {
            Self::MissingFields(fields) => fields,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Field cannot be empty".into()));
    }
    Ok(())
}

/// Raw course fields as submitted by a client.
///
/// Absent fields deserialize as empty strings so that a partial submission is
/// reported as a validation failure rather than a decoding error.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CourseForm {
    /// Course code.
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    /// Course title.
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    /// Instructor.
    #[validate(custom(function = "not_blank"))]
    pub instructor: String,
    /// Semester.
    #[validate(custom(function = "not_blank"))]
    pub semester: String,
    /// Schedule.
    #[validate(custom(function = "not_blank"))]
    pub schedule: String,
    /// Classroom.
    #[validate(custom(function = "not_blank"))]
    pub classroom: String,
    /// Prerequisites.
    #[validate(custom(function = "not_blank"))]
    pub prerequisites: String,
    /// Grading scheme.
    #[validate(custom(function = "not_blank"))]
    pub grading: String,
    /// Description.
    #[validate(custom(function = "not_blank"))]
    pub description: String,
}

impl CourseForm {
    /// Validates every field and converts the form into a trimmed `Course`.
    ///
    /// # Errors
    ///
    /// Returns `CourseValidationError::MissingFields` listing every field that
    /// is empty after trimming whitespace.
    pub fn into_course(self) -> Result<Course, CourseValidationError> {
        if let Err(errors) = self.validate() {
            let failed = errors.field_errors();
            let missing = COURSE_FIELDS
                .iter()
                .filter(|field| failed.keys().any(|key| key.to_string() == **field))
                .map(|field| (*field).to_string())
                .collect();
            return Err(CourseValidationError::MissingFields(missing));
        }

        Ok(Course {
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            instructor: self.instructor.trim().to_string(),
            semester: self.semester.trim().to_string(),
            schedule: self.schedule.trim().to_string(),
            classroom: self.classroom.trim().to_string(),
            prerequisites: self.prerequisites.trim().to_string(),
            grading: self.grading.trim().to_string(),
            description: self.description.trim().to_string(),
        })
    }

    /// Returns a fully populated form for the given code.
    ///
    /// Handy for examples and tests.
    #[must_use]
    pub fn sample(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: "Intro".to_string(),
            instructor: "Dr. Ada".to_string(),
            semester: "Fall".to_string(),
            schedule: "Mon/Wed 10:00".to_string(),
            classroom: "B-204".to_string(),
            prerequisites: "None".to_string(),
            grading: "Letter".to_string(),
            description: "An introductory course.".to_string(),
        }
    }
}
