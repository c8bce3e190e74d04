//! The studentdb-client executable supports the following command line arguments:
//!
//! `studentdb-client students [--addr IP-PORT]`
//!
//!     List every student as: ID, full name and index number.
//!
//! `studentdb-client grades <STUDENT_ID> [--addr IP-PORT]`
//!
//!     List the grades of a student.
//!
//! `studentdb-client add-student <FIRST_NAME> <LAST_NAME> <INDEX_NUMBER> [--addr IP-PORT]`
//!
//!     Add a student. The index number must not be used by any other student.
//!
//! `studentdb-client rm-student <STUDENT_ID> [--addr IP-PORT]`
//!
//!     Remove a student together with all of their grades.
//!
//! `studentdb-client add-course <NAME> [--addr IP-PORT]`
//!
//!     Add a course, nothing happens if the course already exists.
//!
//! `studentdb-client add-grade <STUDENT_ID> <COURSE> <VALUE> [--addr IP-PORT]`
//!
//!     Give a student a grade (2, 3, 4 or 5) for a course. The course is created if needed.
//!
//! `studentdb-client rm-grade <STUDENT_ID> <COURSE> [--addr IP-PORT]`
//!
//!     Remove a student's grade for a course.
//!
//! --addr accepts an IP address, either v4 or v6, and a port number, with the format IP:PORT.
//! If --addr is not specified then connect on 127.0.0.1:4000.
//! Print an error and return a non-zero exit code on server error, or if IP-PORT does not parse
//! as an address.
//!
//! `studentdb-client -V`
//!
//!     Print the version.

use std::net::SocketAddr;
use std::process::exit;
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use studentdb::{Request, Result, StudentClient, StudentDbError, StudentDto};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    req: Request,
}

impl Opt {
    fn new(addr: SocketAddr, req: Request) -> Self {
        Self { addr, req }
    }

    /// validates the `addr` parameter is a valid IP address and PORT, and that the request
    /// carries usable values
    /// # Errors
    /// returns [`StudentDbError::Parsing`] if the address is invalid or
    /// [`StudentDbError::Invalid`] if the request is
    ///
    fn build(addr: &str, req: Request) -> Result<Opt> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| StudentDbError::Parsing(format!("could not parse {} into an IP address and port", &addr)))?;
        req.validate()?;

        Ok(Opt::new(addr, req))
    }
}

fn main() {
    let student_id = || Arg::with_name("STUDENT_ID").required(true).index(1);
    let course = || Arg::with_name("COURSE").required(true).index(2);

    let matches = App::new("studentdb-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("manages students, courses and grades kept by a studentdb-server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommands(vec![
            SubCommand::with_name("students")
                .about("List every student"),
            SubCommand::with_name("grades")
                .about("List the grades of a student")
                .arg(student_id()),
            SubCommand::with_name("add-student")
                .about("Add a new student")
                .arg(Arg::with_name("FIRST_NAME").required(true).index(1))
                .arg(Arg::with_name("LAST_NAME").required(true).index(2))
                .arg(Arg::with_name("INDEX_NUMBER").required(true).index(3)),
            SubCommand::with_name("rm-student")
                .about("Remove a student and all of their grades")
                .arg(student_id()),
            SubCommand::with_name("add-course")
                .about("Add a course")
                .arg(Arg::with_name("NAME").required(true).index(1)),
            SubCommand::with_name("add-grade")
                .about("Give a student a grade for a course")
                .arg(student_id())
                .arg(course())
                .arg(Arg::with_name("VALUE")
                    .required(true)
                    .index(3)
                    .help("the grade, must lie on the grading scale")),
            SubCommand::with_name("rm-grade")
                .about("Remove a student's grade for a course")
                .arg(student_id())
                .arg(course()),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT of the server to connect to")
            .global(true)
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("sets the most verbose level that is logged to STDERR")
            .global(true)
            .possible_values(&["error", "warn", "info", "debug", "trace"])
            .default_value("warn"))
        .get_matches();

    // configure a subscriber that will log messages to STDERR
    subscriber_config(global_value(&matches, "log-level").unwrap_or("warn"));

    // parse commands into an Opt struct, then run it
    if let Err(e) = parse_options(&matches).and_then(run) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// runs the specified request on a [`StudentClient`]
/// `opt` contains the server address and the request to execute
fn run(opt: Opt) -> Result<()> {
    let mut client = StudentClient::connect(opt.addr)?;
    match opt.req {
        Request::GetAllStudents => {
            for student in client.get_all_students()? {
                println!(
                    "{}\t{}\t{}",
                    student.id.unwrap_or_default(),
                    student,
                    student.index_number
                );
            }
        }
        Request::GetGradesForStudent { student_id } => {
            let grades = client.get_grades_for_student(student_id)?;
            if grades.is_empty() {
                println!("No grades for this student");
            }
            for grade in grades {
                println!("{}", grade);
            }
        }
        Request::AddStudent { student } => client.add_student(student)?,
        Request::RemoveStudent { student_id } => client.remove_student(student_id)?,
        Request::AddCourse { name } => client.add_course(name)?,
        Request::AddGrade { student_id, course_name, value } => {
            client.add_grade(student_id, course_name, value)?
        }
        Request::RemoveGrade { student_id, course_name } => {
            client.remove_grade(student_id, course_name)?
        }
        Request::Lookup { .. } => {}
    }
    Ok(())
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: &ArgMatches) -> Result<Opt> {
    let addr = global_value(matches, "addr").unwrap_or(DEFAULT_ADDRESS);
    let req = match matches.subcommand() {
        ("students", Some(_)) => Request::GetAllStudents,
        ("grades", Some(args)) => Request::GetGradesForStudent {
            student_id: parse_id(args)?,
        },
        ("add-student", Some(args)) => Request::AddStudent {
            student: StudentDto::new(
                value(args, "FIRST_NAME")?,
                value(args, "LAST_NAME")?,
                value(args, "INDEX_NUMBER")?,
            ),
        },
        ("rm-student", Some(args)) => Request::RemoveStudent {
            student_id: parse_id(args)?,
        },
        ("add-course", Some(args)) => Request::AddCourse {
            name: value(args, "NAME")?,
        },
        ("add-grade", Some(args)) => Request::AddGrade {
            student_id: parse_id(args)?,
            course_name: value(args, "COURSE")?,
            value: value(args, "VALUE")?
                .parse()
                .map_err(|_| StudentDbError::Parsing("VALUE must be a whole number".to_string()))?,
        },
        ("rm-grade", Some(args)) => Request::RemoveGrade {
            student_id: parse_id(args)?,
            course_name: value(args, "COURSE")?,
        },
        (other, _) => return Err(StudentDbError::Parsing(format!("unknown command: {}", other))),
    };
    Opt::build(addr, req)
}

/// global args may be given before or after the subcommand, look in the subcommand first
fn global_value<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a str> {
    matches
        .subcommand()
        .1
        .and_then(|args| args.value_of(name))
        .or_else(|| matches.value_of(name))
}

fn value(args: &ArgMatches, name: &str) -> Result<String> {
    args.value_of(name)
        .map(String::from)
        .ok_or_else(|| StudentDbError::Parsing(format!("missing argument {}", name)))
}

fn parse_id(args: &ArgMatches) -> Result<i64> {
    let id = value(args, "STUDENT_ID")?;
    id.parse()
        .map_err(|_| StudentDbError::Parsing(format!("{} is not a valid student id", id)))
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(level: &str) {
    let subscriber = FmtSubscriber::builder()
        // events at `level` or higher (e.g, warn, error) will be written
        .with_max_level(level.parse().unwrap_or(Level::WARN))
        // log to stderr so command output stays on stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
