//! Course storage trait and the JSON file implementation.
//!
//! The backing file holds the whole catalog as one JSON array. `append` is a
//! read-modify-write of that entire document: load everything, push the new
//! course in memory, overwrite the file. Two unguarded appends that interleave
//! can therefore lose one entry (the second write is based on a stale read).
//!
//! `JsonFileCourseStore` closes that race by default with a single-writer
//! lock held across the whole load/append/write sequence. Readers never take
//! the lock; every write lands in a temporary sibling file that is renamed over
//! the target, so a reader sees either the old or the new document in full.

use crate::models::Course;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors that can occur during course store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be read or written.
    #[error("Failed to access course file {}: {source}", path.display())]
    Io {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The backing file exists but does not contain a valid course list.
    #[error("Course file {} is corrupt: {source}", path.display())]
    Corrupt {
        /// Path of the backing file.
        path: PathBuf,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// A course with the same code is already stored.
    #[error("A course with code '{0}' already exists")]
    DuplicateCode(String),
}

/// How concurrent `append` calls are coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDiscipline {
    /// One writer at a time; duplicate codes are rejected.
    #[default]
    Serialized,
    /// No coordination between writers. Concurrent appends race and may lose
    /// entries; duplicate codes are accepted.
    Unserialized,
}

impl std::fmt::Display for WriteDiscipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialized => write!(f, "serialized"),
            Self::Unserialized => write!(f, "unserialized"),
        }
    }
}

impl std::str::FromStr for WriteDiscipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serialized" => Ok(Self::Serialized),
            "unserialized" => Ok(Self::Unserialized),
            other => Err(format!(
                "unknown write discipline '{other}' (expected 'serialized' or 'unserialized')"
            )),
        }
    }
}

/// Trait for course storage implementations.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait CourseStore: Send + Sync {
    /// Loads every stored course, in insertion order.
    ///
    /// A store that has never been written to is empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data cannot be read or decoded.
    fn load_all(&self) -> Result<Vec<Course>, StoreError>;

    /// Appends a course to the end of the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data cannot be read, decoded or
    /// written, or if the implementation rejects a duplicate code.
    fn append(&self, course: Course) -> Result<(), StoreError>;

    /// Finds the first course with the given code.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing data cannot be read or decoded.
    fn find(&self, code: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|c| c.code == code))
    }
}

/// Course store backed by a single JSON document file.
#[derive(Debug)]
pub struct JsonFileCourseStore {
    path: PathBuf,
    discipline: WriteDiscipline,
    write_lock: Mutex<()>,
}

impl JsonFileCourseStore {
    /// Creates a store using the serialized write discipline.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_discipline(path, WriteDiscipline::default())
    }

    /// Creates a store with an explicit write discipline.
    #[must_use]
    pub fn with_discipline(path: impl Into<PathBuf>, discipline: WriteDiscipline) -> Self {
        Self {
            path: path.into(),
            discipline,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured write discipline.
    #[must_use]
    pub fn discipline(&self) -> WriteDiscipline {
        self.discipline
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write_all(&self, courses: &[Course]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        courses.serialize(&mut ser).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let file_name = self
            .path
            .file_name()
            .map_or_else(|| "courses".into(), |n| n.to_string_lossy());
        let tmp_path = self.path.with_file_name(format!(
            ".{file_name}.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));

        let result = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(&buf)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp_path, &self.path));

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }
        Ok(())
    }
}

impl CourseStore for JsonFileCourseStore {
    fn load_all(&self) -> Result<Vec<Course>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn append(&self, course: Course) -> Result<(), StoreError> {
        let guard = match self.discipline {
            WriteDiscipline::Serialized => Some(
                self.write_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            ),
            WriteDiscipline::Unserialized => None,
        };

        let mut courses = self.load_all()?;
        if guard.is_some() && courses.iter().any(|c| c.code == course.code) {
            return Err(StoreError::DuplicateCode(course.code));
        }
        courses.push(course);
        self.write_all(&courses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseForm;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn course(code: &str) -> Course {
        CourseForm::sample(code).into_course().unwrap()
    }

    fn store_in(dir: &TempDir, discipline: WriteDiscipline) -> JsonFileCourseStore {
        JsonFileCourseStore::with_discipline(dir.path().join("course_catalog.json"), discipline)
    }

    #[test]
    fn test_missing_file_is_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);

        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_append_to_absent_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);

        store.append(course("CS101")).unwrap();

        let courses = store.load_all().unwrap();
        assert_eq!(courses, vec![course("CS101")]);
    }

    #[test]
    fn test_append_keeps_order_and_last_is_new() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);

        store.append(course("CS101")).unwrap();
        store.append(course("CS102")).unwrap();
        store.append(course("MA201")).unwrap();

        let courses = store.load_all().unwrap();
        let codes: Vec<&str> = courses.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, ["CS101", "CS102", "MA201"]);
        assert_eq!(courses.last(), Some(&course("MA201")));
    }

    #[test]
    fn test_load_all_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();

        assert_eq!(store.load_all().unwrap(), store.load_all().unwrap());
    }

    #[test]
    fn test_file_is_indented_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();

        assert!(raw.starts_with('['));
        assert!(raw.contains("\n        \"code\": \"CS101\""));
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();
        store.append(course("CS102")).unwrap();

        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        fs::write(store.path(), "{ not a course list").unwrap();

        assert!(matches!(
            store.load_all(),
            Err(StoreError::Corrupt { .. })
        ));
        assert!(matches!(
            store.append(course("CS101")),
            Err(StoreError::Corrupt { .. })
        ));
        // The corrupt document is left untouched.
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "{ not a course list"
        );
    }

    #[test]
    fn test_find_by_code() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();
        store.append(course("CS102")).unwrap();

        assert_eq!(store.find("CS102").unwrap(), Some(course("CS102")));
        assert_eq!(store.find("CS999").unwrap(), None);
    }

    #[test]
    fn test_serialized_rejects_duplicate_code() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();

        let result = store.append(course("CS101"));

        assert!(matches!(result, Err(StoreError::DuplicateCode(code)) if code == "CS101"));
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_duplicate_leaves_document_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Serialized);
        store.append(course("CS101")).unwrap();
        store.append(course("CS102")).unwrap();
        let before = fs::read(store.path()).unwrap();

        assert!(store.append(course("CS102")).is_err());
        assert_eq!(fs::read(store.path()).unwrap(), before);

        store.append(course("CS103")).unwrap();
        let codes: Vec<String> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, ["CS101", "CS102", "CS103"]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unserialized_tolerates_duplicate_code() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, WriteDiscipline::Unserialized);
        store.append(course("CS101")).unwrap();
        store.append(course("CS101")).unwrap();

        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    fn concurrent_appends(discipline: WriteDiscipline) -> Vec<Course> {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir, discipline));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["A100", "B200"]
            .into_iter()
            .map(|code| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.append(course(code))
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        store.load_all().unwrap()
    }

    #[test]
    fn test_concurrent_appends_serialized_keep_both() {
        for _ in 0..20 {
            let courses = concurrent_appends(WriteDiscipline::Serialized);
            assert_eq!(courses.len(), 2);
            assert!(courses.iter().any(|c| c.code == "A100"));
            assert!(courses.iter().any(|c| c.code == "B200"));
        }
    }

    #[test]
    fn test_concurrent_appends_unserialized_keep_at_least_one() {
        for _ in 0..20 {
            let courses = concurrent_appends(WriteDiscipline::Unserialized);
            assert!(!courses.is_empty());
            assert!(courses.len() <= 2);
        }
    }

    #[test]
    fn test_write_discipline_parse() {
        assert_eq!(
            "serialized".parse::<WriteDiscipline>().unwrap(),
            WriteDiscipline::Serialized
        );
        assert_eq!(
            "UNSERIALIZED".parse::<WriteDiscipline>().unwrap(),
            WriteDiscipline::Unserialized
        );
        assert!("locked".parse::<WriteDiscipline>().is_err());
        assert_eq!(WriteDiscipline::Serialized.to_string(), "serialized");
    }
}
