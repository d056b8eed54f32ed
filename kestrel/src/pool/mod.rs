//! The worker pool for blocking work.
//!
//! [`submit`] moves a closure onto one of the pool's threads and returns a
//! future for its result. The result travels back through the loop's remote
//! queue, so the awaiting task is resumed on the loop thread like any other
//! operation. The pool is sized when [`run`](crate::run) starts the loop.

mod queue;
mod worker;

pub(crate) use worker::WorkerPool;

use crate::error::{Fatal, OperationError, abort};
use crate::reactor::{Remote, RequestId, WorkOutcome};
use crate::runtime;

use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};

/// A type-erased closure. Its result is downcast back on the loop thread.
type Work = Box<dyn FnOnce() -> Box<dyn Any + Send> + Send>;

/// A unit of blocking work queued on the pool.
pub(crate) struct Job {
    /// The reactor request the outcome is reported against.
    pub(crate) request: RequestId,

    /// Set when the awaiting future is dropped. A worker that sees it before
    /// starting skips the closure.
    pub(crate) cancelled: Arc<AtomicBool>,

    /// The closure to run.
    pub(crate) work: Work,

    /// Where the worker reports the outcome.
    pub(crate) remote: Arc<Remote>,
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Runs `work` on the worker pool.
///
/// The work is queued the first time the returned future is polled. If the
/// closure panics, the future resolves to [`OperationError::Panicked`].
/// Dropping the future before it resolves cancels the request: a job not yet
/// picked up is skipped, and the result of a job already running is
/// discarded.
///
/// Resolves to [`OperationError::Shutdown`] when no loop is running.
pub fn submit<F, T>(work: F) -> Submit<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Submit {
        work: Some(Box::new(move || Box::new(work()) as Box<dyn Any + Send>)),
        pending: None,
        _output: PhantomData,
    }
}

/// Where the completion callback leaves the result for the future.
enum Slot<T> {
    /// No outcome yet. Holds the waker of the last poll.
    Waiting(Option<Waker>),
    Done(Result<T, OperationError>),
    Taken,
}

/// A request handed to the pool and not yet resolved.
struct Pending<T> {
    request: RequestId,
    slot: Rc<RefCell<Slot<T>>>,
    cancelled: Arc<AtomicBool>,
}

/// Future returned by [`submit`].
#[must_use = "futures do nothing unless polled"]
pub struct Submit<T> {
    work: Option<Work>,
    pending: Option<Pending<T>>,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Submit<T> {
    fn start(&mut self, cx: &mut Context<'_>) -> Poll<Result<T, OperationError>> {
        let Some(work) = self.work.take() else {
            abort(Fatal::Programming("pool request polled after completion"));
        };

        let Some(event_loop) = runtime::current() else {
            return Poll::Ready(Err(OperationError::Shutdown));
        };

        let slot = Rc::new(RefCell::new(Slot::Waiting(Some(cx.waker().clone()))));
        let on_complete = {
            let slot = slot.clone();
            Box::new(move |outcome: WorkOutcome| complete(&slot, outcome))
        };

        let Some(request) = event_loop.reactor().begin_request(on_complete) else {
            return Poll::Ready(Err(OperationError::Shutdown));
        };

        let cancelled = Arc::new(AtomicBool::new(false));
        let job = Job {
            request,
            cancelled: cancelled.clone(),
            work,
            remote: event_loop.reactor().remote().clone(),
        };

        if event_loop.submit(job).is_err() {
            event_loop.reactor().abandon_request(request);
            return Poll::Ready(Err(OperationError::Shutdown));
        }

        self.pending = Some(Pending {
            request,
            slot,
            cancelled,
        });

        Poll::Pending
    }
}

fn complete<T: 'static>(slot: &RefCell<Slot<T>>, outcome: WorkOutcome) {
    let result = match outcome {
        WorkOutcome::Finished(value) => match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => abort(Fatal::Programming("pool result has the wrong type")),
        },
        WorkOutcome::Panicked(message) => Err(OperationError::Panicked(message)),
        WorkOutcome::Skipped => Err(OperationError::Shutdown),
    };

    let previous = mem::replace(&mut *slot.borrow_mut(), Slot::Done(result));
    if let Slot::Waiting(Some(waker)) = previous {
        waker.wake();
    }
}

impl<T: Send + 'static> Future for Submit<T> {
    type Output = Result<T, OperationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let Some(pending) = &this.pending else {
            return this.start(cx);
        };

        let mut slot = pending.slot.borrow_mut();
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Done(result) => {
                drop(slot);
                this.pending = None;
                Poll::Ready(result)
            }
            Slot::Waiting(_) => {
                *slot = Slot::Waiting(Some(cx.waker().clone()));
                Poll::Pending
            }
            Slot::Taken => abort(Fatal::Programming("pool result taken twice")),
        }
    }
}

impl<T> Drop for Submit<T> {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        pending.cancelled.store(true, Ordering::Release);

        if let Some(event_loop) = runtime::current() {
            event_loop.reactor().forget_request(pending.request);
        }
    }
}
