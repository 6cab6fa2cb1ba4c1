//! Background worker pool
//!
//! Gameplay stays on the main thread. The pool runs blocking work such as
//! asset reads and decoding; results come back through channels drained on
//! the main thread.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, trace};
use thiserror::Error;

/// Jobs waiting beyond this many block the submitter
pub const QUEUE_CAPACITY: usize = 100;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The pool is shutting down
    #[error("worker pool is shut down")]
    Closed,
}

/// Fixed-size thread pool
pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl WorkerPool {
    /// Pool with `size` threads (at least one)
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = bounded(QUEUE_CAPACITY);
        let size = size.max(1);
        let workers = (0..size).map(|id| Worker::new(id, receiver.clone())).collect();
        debug!("worker pool started with {size} threads");
        Self {
            workers,
            sender: Some(sender),
        }
    }

    /// Number of threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Run `job` on the next free worker
    pub fn execute<F>(&self, job: F) -> Result<(), JobError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(JobError::Closed)?;
        sender.send(Box::new(job)).map_err(|_| JobError::Closed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once the queue drains.
        self.sender.take();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    error!("worker {} panicked", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Job>) -> Self {
        let thread = thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                trace!("worker {id} picked up a job");
                job();
            }
        });
        Self {
            id,
            thread: Some(thread),
        }
    }
}
