//! Storage traits and implementations.
//!
//! The `CourseStore` trait defines the read-all/append contract of the
//! catalog; `JsonFileCourseStore` persists it in a single JSON document.

pub mod course_store;

pub use course_store::{CourseStore, JsonFileCourseStore, StoreError, WriteDiscipline};
