use crate::{Result, StudentStore};
use crate::command::{Request, Response};
use serde_json::Deserializer;
use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info};
use crate::thread_pool::{ThreadPool};

/// the name the student service is bound under, clients must look it up before use
pub const SERVICE_NAME: &str = "StudentService";

/// A TCP socket server that exposes a [`StudentStore`] to remote clients.
/// It listens for incoming connections on a [`SocketAddr`](https://doc.rust-lang.org/std/net/enum.SocketAddr.html)
/// and serves every connection on a thread of its [`ThreadPool`].
///
/// Each thread receives a handle to the [`StudentStore`], and uses that store to process the
/// [`Request`]s arriving on its connection.
///
/// # Example
/// Create a server listening on "127.0.0.1:4000", with 4 threads running on a shared queue
/// thread pool, using the sqlite storage engine
/// ```rust
/// use std::path::Path;
/// use studentdb::{SqliteStore, StudentServer};
/// use studentdb::thread_pool::{SharedQueueThreadPool, ThreadPool};
/// # fn main() -> studentdb::Result<()> {
/// let pool = SharedQueueThreadPool::new(4)?;
/// let store = SqliteStore::open(Path::new("."))?;
/// let server = StudentServer::new(store, pool);
/// // server.run("127.0.0.1:4000")?;
/// # Ok(())
/// # }
/// ```
///
/// [`Request`]: ./enum.Request.html
///
pub struct StudentServer<S: StudentStore, P: ThreadPool> {
    /// the storage engine to use
    store: S,
    /// a pool of threads that will serve connections using a handle to the store
    pool: P,
}

impl<S: StudentStore, P: ThreadPool> StudentServer<S, P> {
    /// Create a new `StudentServer` using the given [`StudentStore`] and [`ThreadPool`] implementation.
    pub fn new(store: S, pool: P) -> Self {
        StudentServer {
            store,
            pool,
        }
    }

    /// starts a server listening on the given address.
    ///
    /// # Errors
    /// returns [`StudentDbError`] if the address could not be bound
    ///
    /// [`StudentDbError`]: ./enum.StudentDbError.html
    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        self.serve(TcpListener::bind(addr)?)
    }

    /// accepts connections on an already bound `listener`.
    /// Each connection that comes in gets serviced on its own thread from the ThreadPool
    pub fn serve(self, listener: TcpListener) -> Result<()> {
        info!("{} bound at {}", SERVICE_NAME, listener.local_addr()?);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let store = self.store.clone();
                    self.pool.spawn(move || {
                        if let Err(e) = serve(store, stream) {
                            error!("Error on serving client: {}", e);
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

/// Listens for and processes [`Request`]s coming over the given `tcp` stream.
/// Every request is answered with exactly one [`Response`], a request that fails is reported
/// back as [`Response::Err`] and the connection stays open.
///
/// [`Request`]: ./enum.Request.html
/// [`Response`]: ./enum.Response.html
///
fn serve<S: StudentStore>(store: S, tcp: TcpStream) -> Result<()> {
    let peer_addr = tcp.peer_addr()?;
    let stream_reader = BufReader::new(&tcp);
    let mut stream_writer = BufWriter::new(&tcp);
    let req_reader = Deserializer::from_reader(stream_reader).into_iter::<Request>();

    let mut send_resp = move |resp: Response| -> Result<()> {
        serde_json::to_writer(&mut stream_writer, &resp)?;
        stream_writer.flush()?;
        debug!("Response sent to {}: {:?}", peer_addr, resp);
        Ok(())
    };

    for req in req_reader {
        let req = req?;
        debug!("Receive request from {}: {:?}", peer_addr, req);
        send_resp(dispatch(&store, req))?;
    }
    debug!("{} disconnected", peer_addr);
    Ok(())
}

/// validates `req` and runs it against the `store`
fn dispatch<S: StudentStore>(store: &S, req: Request) -> Response {
    if let Err(e) = req.validate() {
        return Response::Err(e.to_string());
    }

    let result = match req {
        Request::Lookup { service } if service == SERVICE_NAME => Ok(Response::Ok),
        Request::Lookup { service } => {
            return Response::Err(format!("no service is bound under the name {}", service))
        }
        Request::GetAllStudents => store.get_all_students().map(Response::Students),
        Request::GetGradesForStudent { student_id } => {
            store.get_grades_for_student(student_id).map(Response::Grades)
        }
        Request::AddStudent { student } => store.add_student(student).map(|_| Response::Ok),
        Request::RemoveStudent { student_id } => {
            store.remove_student(student_id).map(|_| Response::Ok)
        }
        Request::AddCourse { name } => store.add_course(name).map(|_| Response::Ok),
        Request::AddGrade { student_id, course_name, value } => {
            store.add_grade(student_id, course_name, value).map(|_| Response::Ok)
        }
        Request::RemoveGrade { student_id, course_name } => {
            store.remove_grade(student_id, course_name).map(|_| Response::Ok)
        }
    };

    match result {
        Ok(resp) => resp,
        Err(e) => Response::Err(e.to_string()),
    }
}
