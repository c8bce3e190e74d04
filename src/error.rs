use std::io;
use sled::transaction::TransactionError;
use thiserror::Error;

/// type alias for all operations on a [`StudentStore`] that could fail with a [`StudentDbError`]
///
/// [`StudentStore`]: ./trait.StudentStore.html
pub type Result<T> = std::result::Result<T, StudentDbError>;

/// The Error variants used throughout studentdb.
/// It wraps any lower level errors from third party crates, as well as the "domain" errors
/// raised when a request would violate one of the store's constraints
#[derive(Error, Debug)]
pub enum StudentDbError {
    /// variant for errors caused from file or socket IO
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// a request or response could not be (de)serialized
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// error raised by the sled engine
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// error raised by the sqlite engine
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// the referenced student does not exist
    #[error("student with id {0} does not exist")]
    StudentNotFound(i64),

    /// another student already uses this index number
    #[error("a student with index number {0} already exists")]
    DuplicateIndexNumber(String),

    /// the student already has a grade for the course
    #[error("student {student_id} already has a grade for course {course_name}")]
    DuplicateGrade {
        /// id of the student
        student_id: i64,
        /// name of the course
        course_name: String,
    },

    /// the request failed validation and never reached the store
    #[error("invalid request: {0}")]
    Invalid(String),

    /// command line or configuration values could not be parsed
    #[error("parsing error: {0}")]
    Parsing(String),

    /// an error message, usually one that was received from the server
    #[error("{0}")]
    StringErr(String),
}

impl From<TransactionError<StudentDbError>> for StudentDbError {
    fn from(e: TransactionError<StudentDbError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StudentDbError::Sled(e),
        }
    }
}
