use serde::{Deserialize, Serialize};
use crate::{GradeDto, Result, StudentDbError, StudentDto};

/// the lowest and highest grade that can be given
pub const GRADE_SCALE: std::ops::RangeInclusive<i32> = 2..=5;

/// These are the request "commands" that can be sent to a [`StudentServer`]
///
/// [`StudentServer`]: ./struct.StudentServer.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// ask the server for the service bound under `service`
    Lookup {
        /// the name the service was registered with
        service: String
    },
    /// list every student
    GetAllStudents,
    /// list the grades of one student
    GetGradesForStudent {
        /// id of the student
        student_id: i64
    },
    /// add a new student
    AddStudent {
        /// the student to add, its id is ignored
        student: StudentDto
    },
    /// remove a student along with all of their grades
    RemoveStudent {
        /// id of the student
        student_id: i64
    },
    /// add a course if one with the same name does not exist yet
    AddCourse {
        /// the course name
        name: String
    },
    /// give a student a grade for a course
    AddGrade {
        /// id of the student
        student_id: i64,
        /// the course name, the course is created if needed
        course_name: String,
        /// the grade
        value: i32,
    },
    /// remove a student's grade for a course
    RemoveGrade {
        /// id of the student
        student_id: i64,
        /// the course name
        course_name: String,
    },
}

impl Request {
    /// checks the request carries usable values before it is sent to a store
    ///
    /// # Errors
    /// returns [`StudentDbError::Invalid`] for blank names or a grade outside of [`GRADE_SCALE`]
    pub fn validate(&self) -> Result<()> {
        match self {
            Request::AddStudent { student } => {
                not_blank("first name", &student.first_name)?;
                not_blank("last name", &student.last_name)?;
                not_blank("index number", &student.index_number)
            }
            Request::AddCourse { name } => not_blank("course name", name),
            Request::AddGrade { course_name, value, .. } => {
                not_blank("course name", course_name)?;
                if GRADE_SCALE.contains(value) {
                    Ok(())
                } else {
                    Err(StudentDbError::Invalid(format!(
                        "grade {} is outside of the scale {}..={}",
                        value,
                        GRADE_SCALE.start(),
                        GRADE_SCALE.end()
                    )))
                }
            }
            Request::RemoveGrade { course_name, .. } => not_blank("course name", course_name),
            _ => Ok(()),
        }
    }
}

fn not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(StudentDbError::Invalid(format!("{} must not be blank", field)))
    } else {
        Ok(())
    }
}

/// The response Types that can be returned for any [`Request`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// the request succeeded and has no result
    Ok,
    /// result of [`Request::GetAllStudents`]
    Students(Vec<StudentDto>),
    /// result of [`Request::GetGradesForStudent`]
    Grades(Vec<GradeDto>),
    /// this variant is returned if an Error occurs while processing the request
    Err(String),
}
