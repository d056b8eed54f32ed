use super::queue::JobQueue;
use super::{Job, panic_message};
use crate::reactor::{RemoteEvent, WorkOutcome};

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

/// A fixed set of threads running blocking jobs off the loop thread.
pub(crate) struct WorkerPool {
    /// Queue shared with every worker thread.
    queue: Arc<JobQueue>,

    /// Join handles, emptied by [`shutdown`](WorkerPool::shutdown).
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `threads` named workers. Fails if a thread cannot be spawned.
    pub(crate) fn new(threads: usize) -> io::Result<Self> {
        let queue = Arc::new(JobQueue::new());
        let mut pool = Self {
            queue,
            handles: Vec::with_capacity(threads),
        };

        for id in 0..threads {
            let queue = pool.queue.clone();
            let handle = thread::Builder::new()
                .name(format!("kestrel-worker-{id}"))
                .spawn(move || run(&queue))?;

            pool.handles.push(handle);
        }

        Ok(pool)
    }

    pub(crate) fn push(&self, job: Job) {
        self.queue.push(job);
    }

    pub(crate) fn size(&self) -> usize {
        self.handles.len()
    }

    /// Lets workers finish queued jobs, then joins them.
    pub(crate) fn shutdown(&mut self) {
        self.queue.shutdown();

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(queue: &JobQueue) {
    while let Some(job) = queue.pop() {
        execute(job);
    }
}

fn execute(job: Job) {
    let Job {
        request,
        cancelled,
        work,
        remote,
    } = job;

    let outcome = if cancelled.load(Ordering::Acquire) {
        WorkOutcome::Skipped
    } else {
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => WorkOutcome::Finished(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(request, %message, "pool job panicked");
                WorkOutcome::Panicked(message)
            }
        }
    };

    remote.push(RemoteEvent::Completed { request, outcome });
}
