use std::thread;
use tracing::debug;
use crate::Result;
use super::ThreadPool;

/// a simple thread-pool that is not actually a pool. It starts a new thread on every spawn
/// request, `threads` is only reported in the logs
pub struct NaiveThreadPool {
    threads: u32,
}

impl ThreadPool for NaiveThreadPool {

    fn new(threads: u32) -> Result<Self> {
        debug!("naive thread pool ignores the requested {} threads", threads);
        Ok(NaiveThreadPool {
            threads
        })
    }

    fn spawn<F>(&self, job: F) where F: FnOnce() + Send + 'static {
        debug!(threads = self.threads, "starting a thread for a new job");
        thread::spawn(job);
    }
}
