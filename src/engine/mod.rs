//! This module provides the storage engines that back the student service.
//! The two engines that are implemented are [`SqliteStore`], a relational store built on
//! [`rusqlite`], and [`SledStore`], which keeps the same model in [`sled`] trees.
//!
//! Both engines run every operation inside a single transaction, so a failed operation
//! leaves no partial changes behind.
//!
//! [`rusqlite`]: https://docs.rs/rusqlite/latest/rusqlite/
//! [`sled`]: https://docs.rs/sled/latest/sled/
use crate::{GradeDto, Result, StudentDto};

/// A trait for the operations of the student service facade.
///
/// Implementors are cloned into every worker thread of the server, so a clone must be a cheap
/// handle onto the same underlying store.
pub trait StudentStore: Clone + Send + 'static {
    /// Returns every student, ordered by id
    fn get_all_students(&self) -> Result<Vec<StudentDto>>;

    /// Returns the grades of the student with `student_id`, ordered by grade id
    ///
    /// An unknown student has no grades, so an empty list is returned.
    fn get_grades_for_student(&self, student_id: i64) -> Result<Vec<GradeDto>>;

    /// Adds a new student. The `id` of the given DTO is ignored.
    ///
    /// # Errors
    ///
    /// Returns `StudentDbError::DuplicateIndexNumber` if the index number is already in use.
    fn add_student(&self, student: StudentDto) -> Result<()>;

    /// Removes a student and all of their grades. Removing an unknown student does nothing.
    fn remove_student(&self, student_id: i64) -> Result<()>;

    /// Adds a course called `name` unless one already exists
    fn add_course(&self, name: String) -> Result<()>;

    /// Gives the student a grade for the course called `course_name`, creating the course when
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StudentDbError::StudentNotFound` if the student does not exist, or
    /// `StudentDbError::DuplicateGrade` if the student already has a grade for that course.
    fn add_grade(&self, student_id: i64, course_name: String, value: i32) -> Result<()>;

    /// Removes the student's grade for the course called `course_name`, if there is one
    fn remove_grade(&self, student_id: i64, course_name: String) -> Result<()>;
}

mod sled_store;
mod sqlite;

pub use self::sled_store::SledStore;
pub use self::sqlite::SqliteStore;
