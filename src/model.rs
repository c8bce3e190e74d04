use std::fmt;
use serde::{Deserialize, Serialize};

/// A serializable copy of a student, safe to send between the client and server.
///
/// `id` is `None` when the DTO is used to create a new student, the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDto {
    /// the generated id of the student
    pub id: Option<i64>,
    /// the student's first name
    pub first_name: String,
    /// the student's last name
    pub last_name: String,
    /// the student's index number, unique across all students
    pub index_number: String,
}

impl StudentDto {
    /// builds a DTO for a student that has not been stored yet
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        index_number: impl Into<String>,
    ) -> Self {
        StudentDto {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            index_number: index_number.into(),
        }
    }
}

impl fmt::Display for StudentDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// A serializable copy of a grade. The course is flattened to its name so the DTO carries no
/// references back to the student or course records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDto {
    /// the generated id of the grade
    pub id: i64,
    /// name of the course the grade was given for
    pub course_name: String,
    /// the grade itself
    pub value: f64,
}

impl fmt::Display for GradeDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.course_name, self.value)
    }
}
