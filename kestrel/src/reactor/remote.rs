use super::RequestId;
use super::poller::EventFd;
use crate::runtime::task::TaskId;

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// The result of a job executed on the worker pool.
pub(crate) enum WorkOutcome {
    Finished(Box<dyn Any + Send>),
    Panicked(String),
    /// The requester cancelled before a worker picked the job up.
    Skipped,
}

pub(crate) enum RemoteEvent {
    Completed {
        request: RequestId,
        outcome: WorkOutcome,
    },
    Wake(TaskId),
}

/// The only channel into the loop from other threads.
///
/// Pushing an event signals the poller's eventfd so a blocked poll returns
/// and the event is delivered in the same iteration.
pub(crate) struct Remote {
    queue: Mutex<VecDeque<RemoteEvent>>,
    wake: Arc<EventFd>,
    closed: AtomicBool,
}

impl Remote {
    pub(crate) fn new(wake: Arc<EventFd>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            wake,
            closed: AtomicBool::new(false),
        }
    }

    /// Queues `event` for the loop thread. Events pushed after the loop has
    /// closed are dropped.
    pub(crate) fn push(&self, event: RemoteEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
        self.wake.wake();
    }

    pub(crate) fn take(&self) -> VecDeque<RemoteEvent> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.take();
    }

    pub(crate) fn wake_fd(&self) -> std::os::fd::RawFd {
        self.wake.raw()
    }
}
