use super::Job;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// The pool's shared job queue.
///
/// Workers block on the condition variable while the queue is empty. After
/// shutdown they finish what is queued and then exit.
pub(crate) struct JobQueue {
    queue: Mutex<VecDeque<Job>>,

    /// Signalled on every push and on shutdown.
    condvar: Condvar,

    shutdown: AtomicBool,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Queues a job and wakes one idle worker.
    pub(crate) fn push(&self, job: Job) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
        self.condvar.notify_one();
    }

    /// Blocks until a job is available. Returns `None` once the queue is
    /// shut down and empty.
    pub(crate) fn pop(&self) -> Option<Job> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            if let Some(job) = queue.pop_front() {
                return Some(job);
            }

            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }

            queue = self
                .condvar
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn shutdown(&self) {
        // Taking the lock orders the flag against a worker about to wait.
        let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.shutdown.store(true, Ordering::Release);
        self.condvar.notify_all();
    }
}
