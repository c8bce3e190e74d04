use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::Deserializer;
use tracing::debug;
use crate::command::{Request, Response};
use crate::server::SERVICE_NAME;
use crate::{GradeDto, Result, StudentDbError, StudentDto};

/// `StudentClient` contains the functionality for communication with a [`StudentServer`]
///
/// [`StudentServer`]: ./struct.StudentServer.html
pub struct StudentClient {
    reader: Deserializer<IoRead<BufReader<TcpStream>>>,
    writer: BufWriter<TcpStream>,
}

impl StudentClient {

    /// creates a client, establishes a socket connection to the server at the given `addr`
    /// and looks up the student service on it
    ///
    /// # Errors
    /// fails if the server cannot be reached or does not offer the student service
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        StudentClient::lookup(addr, SERVICE_NAME)
    }

    /// connects to the server at `addr` and asks it for the service bound under `service`
    pub fn lookup<A: ToSocketAddrs>(addr: A, service: &str) -> Result<Self> {
        let tcp_reader = TcpStream::connect(addr)?;
        let tcp_writer = tcp_reader.try_clone()?;

        let mut client = StudentClient {
            reader: Deserializer::from_reader(BufReader::new(tcp_reader)),
            writer: BufWriter::new(tcp_writer),
        };
        client.call(Request::Lookup { service: service.to_string() })?;
        debug!("looked up {}", service);
        Ok(client)
    }

    /// gets every student from the server
    pub fn get_all_students(&mut self) -> Result<Vec<StudentDto>> {
        match self.call(Request::GetAllStudents)? {
            Response::Students(students) => Ok(students),
            other => Err(unexpected(other)),
        }
    }

    /// gets the grades of the student with `student_id`
    pub fn get_grades_for_student(&mut self, student_id: i64) -> Result<Vec<GradeDto>> {
        match self.call(Request::GetGradesForStudent { student_id })? {
            Response::Grades(grades) => Ok(grades),
            other => Err(unexpected(other)),
        }
    }

    /// sends a new student to the server
    /// # Errors
    /// `Err<StudentDbError::StringErr>` if the server rejected the student, e.g. because the
    /// index number is already taken
    pub fn add_student(&mut self, student: StudentDto) -> Result<()> {
        self.call(Request::AddStudent { student }).map(|_| ())
    }

    /// removes a student and all of their grades
    pub fn remove_student(&mut self, student_id: i64) -> Result<()> {
        self.call(Request::RemoveStudent { student_id }).map(|_| ())
    }

    /// adds a course unless one with the same name exists
    pub fn add_course(&mut self, name: String) -> Result<()> {
        self.call(Request::AddCourse { name }).map(|_| ())
    }

    /// gives a student a grade for a course
    /// # Errors
    /// `Err<StudentDbError::StringErr>` if the student does not exist or already has a grade
    /// for the course
    pub fn add_grade(&mut self, student_id: i64, course_name: String, value: i32) -> Result<()> {
        self.call(Request::AddGrade { student_id, course_name, value }).map(|_| ())
    }

    /// removes a student's grade for a course
    pub fn remove_grade(&mut self, student_id: i64, course_name: String) -> Result<()> {
        self.call(Request::RemoveGrade { student_id, course_name }).map(|_| ())
    }

    /// sends `req` and waits for its response, re-throwing an `Err` response as an error
    fn call(&mut self, req: Request) -> Result<Response> {
        serde_json::to_writer(&mut self.writer, &req)?;
        self.writer.flush()?;

        match Response::deserialize(&mut self.reader)? {
            Response::Err(msg) => Err(StudentDbError::StringErr(msg)),
            resp => Ok(resp),
        }
    }
}

fn unexpected(resp: Response) -> StudentDbError {
    StudentDbError::StringErr(format!("unexpected response from server: {:?}", resp))
}
