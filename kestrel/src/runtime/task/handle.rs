use super::TaskId;
use super::state::State;
use crate::error::{Fatal, JoinError, abort};
use crate::runtime::context;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

enum Output<T> {
    Pending,
    Ready(Result<T, JoinError>),
    Taken,
}

/// State shared between a task and its [`JoinHandle`].
pub(crate) struct JoinState<T> {
    pub(crate) id: TaskId,
    pub(crate) state: Cell<State>,
    pub(crate) cancelled: Cell<bool>,
    output: RefCell<Output<T>>,
    waiter: RefCell<Option<Waker>>,
}

impl<T> JoinState<T> {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            state: Cell::new(State::Created),
            cancelled: Cell::new(false),
            output: RefCell::new(Output::Pending),
            waiter: RefCell::new(None),
        }
    }

    /// Stores the task's result and wakes whoever awaits it.
    pub(crate) fn finish(&self, result: Result<T, JoinError>) {
        *self.output.borrow_mut() = Output::Ready(result);

        let waiter = self.waiter.borrow_mut().take();
        if let Some(waiter) = waiter {
            waiter.wake();
        }
    }

    fn take(&self) -> Option<Result<T, JoinError>> {
        let mut output = self.output.borrow_mut();
        match std::mem::replace(&mut *output, Output::Taken) {
            Output::Ready(result) => Some(result),
            Output::Pending => {
                *output = Output::Pending;
                None
            }
            Output::Taken => abort(Fatal::Programming("task output taken twice")),
        }
    }
}

/// A handle to a spawned task.
///
/// Awaiting the handle yields the task's output, or
/// [`JoinError::Destroyed`] if the task was dropped during shutdown before it
/// finished. Dropping the handle detaches the task; it keeps running.
///
/// A `JoinHandle` may only be awaited from inside another task.
pub struct JoinHandle<T> {
    shared: Rc<JoinState<T>>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(shared: Rc<JoinState<T>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    /// Requests cooperative cancellation.
    ///
    /// This only sets a flag that the task can observe through
    /// [`cancelled`](super::cancelled). The task is not woken. If the loop
    /// stops while the task is still queued, it is resumed once more so it
    /// can observe the flag and wind down instead of being dropped.
    pub fn cancel(&self) {
        if !self.shared.state.get().is_finished() {
            self.shared.cancelled.set(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.get()
    }

    /// Whether the task completed or was destroyed.
    pub fn is_finished(&self) -> bool {
        self.shared.state.get().is_finished()
    }

    /// Takes the output once the task has finished, without a task context.
    pub(crate) fn try_take(&self) -> Option<Result<T, JoinError>> {
        self.shared.take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if context::current_task().is_none() {
            abort(Fatal::Programming("JoinHandle awaited outside of a task"));
        }

        if let Some(result) = self.shared.take() {
            return Poll::Ready(result);
        }

        *self.shared.waiter.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
