use crate::{ThreadPool, Result, StudentDbError};
use tracing::{debug, error};

/// A thread pool that uses a work stealing strategy as implemented by the [`Rayon`] library.
///
/// Jobs are handed to the pool with `rayon::ThreadPool::spawn`, so the caller (the server's
/// accept loop) never waits on a connection that is being served.
///
/// [`Rayon`]: https://docs.rs/rayon/latest/rayon/index.html
pub struct RayonThreadPool {
    pool: rayon::ThreadPool,
}

impl ThreadPool for RayonThreadPool {

    fn new(threads: u32) -> Result<Self> where Self: Sized {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads as usize)
            .thread_name(|i| format!("studentdb-rayon-{}", i))
            // without a handler a panicking job aborts the whole process
            .panic_handler(|_| error!("a job on the rayon thread pool panicked"))
            .build()
            .map_err(|e|
                StudentDbError::StringErr(format!("could not build thread pool: {:?}", &e)))?;
        debug!("created rayon thread pool with {} threads", &threads);

        Ok(
            Self { pool }
        )
    }

    fn spawn<F>(&self, job: F) where F: FnOnce() + Send + 'static {
        self.pool.spawn(job);
    }
}
