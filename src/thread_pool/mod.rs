//! Thread pools used by the [`StudentServer`] to serve client connections.
//!
//! - [`NaiveThreadPool`] starts a new thread for every job
//! - [`SharedQueueThreadPool`] feeds a fixed set of threads from a crossbeam channel
//! - [`RayonThreadPool`] hands jobs to a rayon work-stealing pool
//!
//! [`StudentServer`]: ../struct.StudentServer.html
use crate::Result;

mod naive;
mod rayon_pool;
mod shared_queue;

pub use self::naive::NaiveThreadPool;
pub use self::rayon_pool::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;

/// The interface of a pool that runs jobs on its threads
pub trait ThreadPool {
    /// creates a new thread pool that immediately spawns `threads` threads
    ///
    /// # Errors
    /// returns an error if any of the threads could not be created
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// runs `job` on one of the threads of the pool
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}
