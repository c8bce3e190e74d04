#![deny(missing_docs)]
//! A multithreaded store of students, courses and grades, served to remote clients.
//!
//! This crate provides the [`StudentStore`] engines themselves, as well as a
//! [`studentdb-client`] and [`studentdb-server`] executable that can be used to work with them.
//! Data is sent between the client and server using synchronous networking over a custom
//! protocol.
//!
//! ## Data Model
//! Three kinds of records are kept:
//!
//! - a **student**, with a first name, last name and an index number that no other student may use
//! - a **course**, with a name that no other course may use
//! - a **grade**, given to one student for one course. A student has at most one grade per course,
//! and removing a student removes their grades as well.
//!
//! Records are handed out as "data transfer objects", [`StudentDto`] and [`GradeDto`], plain
//! copies of the stored fields that can be serialized and sent to a client.
//!
//! ## Supported Operations
//! The student service supports these operations:
//!
//! - list all students
//! - list the grades of one student
//! - add / remove a student
//! - add a course
//! - add / remove a grade
//!
//! See the [`StudentStore`] trait and the [`Request`] and [`Response`] types for more information
//! on the structure of these operations. Every operation that changes data runs inside a single
//! transaction, so it is either applied completely or not at all.
//!
//! ## Engines
//! [`SqliteStore`] keeps the data in three relational tables and lets SQLite enforce the
//! uniqueness and cascade rules. [`SledStore`] keeps the same data in [`sled`] trees and enforces
//! the rules in its own transactions.
//!
//! ## Client / Server
//! Client and server logic is contained in the [`client`] and [`server`] structs. They are
//! responsible for the networking portion of this application, but also handle the
//! serialization of data to/from the custom protocol.
//!
//! ## Custom Protocol
//! The custom protocol is a stream of [`Request`]s encoded to JSON, each one answered by a
//! [`Response`] encoded the same way, sent over a TcpStream.
//! A connection starts with a `Lookup` request naming the service the client wants to use
//! ("StudentService"). After that the client may send any number of requests. If the server was
//! able to service a [`Request`] it answers with a result carrying [`Response`], otherwise with an
//! `Err` response containing a description of the error.
//!
//! ### Client / Server executables
//! As mentioned previously, client and server command line executables are provided.
//! They are implemented by the [`studentdb-client`] and [`studentdb-server`] files.
//!
//! [`sled`]: https://docs.rs/sled/latest/sled/
//! [`client`]: ./struct.StudentClient.html
//! [`server`]: ./struct.StudentServer.html
//! [`StudentStore`]: ./trait.StudentStore.html
//! [`Request`]: ./enum.Request.html
//! [`Response`]: ./enum.Response.html
//! [`studentdb-server`]: ./studentdb-server.rs
//! [`studentdb-client`]: ./studentdb-client.rs


pub use error::{Result, StudentDbError};
pub use engine::{SledStore, SqliteStore, StudentStore};
pub use server::{StudentServer, SERVICE_NAME};
pub use client::StudentClient;
pub use model::{GradeDto, StudentDto};
pub use thread_pool::{ThreadPool, NaiveThreadPool, SharedQueueThreadPool, RayonThreadPool};
pub use command::{Response, Request, GRADE_SCALE};

mod client;
mod command;
mod engine;
mod error;
mod model;
mod server;
pub mod thread_pool;
