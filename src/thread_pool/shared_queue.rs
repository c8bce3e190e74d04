use std::thread;
use crossbeam::channel;
use crossbeam::channel::{Sender, Receiver};
use crate::{ThreadPool, Result};
use tracing::{error, debug, instrument};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A thread pool implemented with a shared job queue (i.e. channel).
///
/// This implementation uses the MPMC [`channel`] provided by the crossbeam crate as a single
/// producer, multiple consumer queue. The single producer is the pool itself, and the threads
/// in the pool are the consumers.
///
/// If a job panics, the thread that ran it is replaced by a new one, so a misbehaving
/// connection handler cannot shrink the pool. Failing to create a replacement thread is only
/// logged.
///
/// [`channel`]: https://docs.rs/crossbeam/0.8.1/crossbeam/channel/index.html
pub struct SharedQueueThreadPool {
    /// the sending part of the channel
    tx: Sender<Job>,
}

impl ThreadPool for SharedQueueThreadPool {

    /// create a new "thread pool" with the given number of `threads`.
    /// Every thread created will have a handle to the receiving end of the channel
    fn new(threads: u32) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<Job>();
        for i in 0..threads {
            let task_rx = TaskReceiver(rx.clone());
            thread::Builder::new()
                .name(format!("studentdb-worker-{}", i))
                .spawn(move || run_tasks(task_rx))?;
        }
        debug!("created shared queue thread pool with {} threads", threads);
        Ok(SharedQueueThreadPool { tx })
    }

    /// Spawns a function into the thread pool.
    ///
    /// # Panics
    ///
    /// Panics if the thread pool has no thread.
    fn spawn<F>(&self, job: F)
        where
            F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .expect("There are no threads in the pool");
    }
}

/// A type that can receive jobs from the channel and run them.
/// Additionally, this type is responsible for restarting any threads that panicked
#[derive(Clone)]
struct TaskReceiver(Receiver<Job>);

impl Drop for TaskReceiver {
    fn drop(&mut self) {
        if thread::panicking() {
            debug!("worker panicked, starting a new thread");
            let task_rx = self.clone();
            if let Err(e) = thread::Builder::new().spawn(move || run_tasks(task_rx)) {
                error!("Failed to spawn a thread: {}", e);
            }
        }
    }
}

/// waits for jobs to arrive on the (wrapped) receiver and runs them, until the pool is dropped
#[instrument(skip(rx))]
fn run_tasks(rx: TaskReceiver) {
    loop {
        match rx.0.recv() {
            Ok(job) => {
                debug!("received a new job");
                job();
            }
            Err(_) => {
                debug!("Thread exited because the thread pool was destroyed.");
                break;
            }
        }
    }
}
