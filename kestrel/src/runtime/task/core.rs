use super::handle::{JoinHandle, JoinState};
use super::state::State;
use super::waker::make_waker;
use crate::error::{Fatal, JoinError, abort};
use crate::runtime::context;

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

/// Unique identifier of a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task as seen by the scheduler and the lifecycle, independent of its
/// output type.
///
/// Every method must be called on the loop thread that owns the task.
pub(crate) trait Resumable {
    fn id(&self) -> TaskId;

    /// Polls the task once. The task must be `Scheduled`.
    fn resume(self: Rc<Self>);

    /// Drops the task's future without completing it. Its awaiter observes
    /// [`JoinError::Destroyed`].
    fn destroy(self: Rc<Self>);

    fn cancelled(&self) -> bool;

    /// Records a wake-up. Returns `true` when the caller must enqueue the
    /// task; a running task is instead re-queued after its poll returns.
    fn notify(&self) -> bool;

    fn is_finished(&self) -> bool;
}

/// A spawned future and the state shared with its [`JoinHandle`].
pub(crate) struct Task<F: Future> {
    shared: Rc<JoinState<F::Output>>,
    future: RefCell<Option<Pin<Box<F>>>>,
    waker: Waker,
    loop_id: u64,
}

impl<F> Resumable for Task<F>
where
    F: Future + 'static,
    F::Output: 'static,
{
    fn id(&self) -> TaskId {
        self.shared.id
    }

    fn resume(self: Rc<Self>) {
        let event_loop = match context::current() {
            Some(event_loop) if event_loop.id() == self.loop_id => event_loop,
            _ => abort(Fatal::Programming("task resumed off its loop thread")),
        };

        match self.shared.state.get() {
            State::Scheduled => {}
            State::Running | State::Notified => {
                abort(Fatal::Programming("task resumed while already running"))
            }
            State::Completed | State::Destroyed => {
                abort(Fatal::Programming("task resumed after it finished"))
            }
            State::Created | State::Suspended => {
                abort(Fatal::Programming("task resumed without being scheduled"))
            }
        }

        self.shared.state.set(State::Running);

        let mut cx = Context::from_waker(&self.waker);
        let poll = {
            let mut slot = self.future.borrow_mut();
            let Some(future) = slot.as_mut() else {
                abort(Fatal::Programming("scheduled task has no future"));
            };

            context::enter_task(self.clone(), || future.as_mut().poll(&mut cx))
        };

        match poll {
            Poll::Ready(output) => {
                let future = self.future.borrow_mut().take();
                drop(future);

                self.shared.state.set(State::Completed);
                self.shared.finish(Ok(output));
                event_loop.release_task(self.shared.id);

                tracing::trace!(task = %self.shared.id, "task completed");
            }
            Poll::Pending => {
                if self.shared.state.get() == State::Notified {
                    self.shared.state.set(State::Scheduled);
                    event_loop.scheduler().schedule(self);
                } else {
                    self.shared.state.set(State::Suspended);
                }
            }
        }
    }

    fn destroy(self: Rc<Self>) {
        match self.shared.state.get() {
            State::Running | State::Notified => {
                abort(Fatal::Programming("task destroyed while running"))
            }
            State::Completed | State::Destroyed => return,
            State::Created | State::Scheduled | State::Suspended => {}
        }

        self.shared.state.set(State::Destroyed);

        let future = self.future.borrow_mut().take();
        drop(future);

        self.shared.finish(Err(JoinError::Destroyed));
        if let Some(event_loop) = context::current() {
            event_loop.release_task(self.shared.id);
        }

        tracing::trace!(task = %self.shared.id, "task destroyed");
    }

    fn cancelled(&self) -> bool {
        self.shared.cancelled.get()
    }

    fn notify(&self) -> bool {
        match self.shared.state.get() {
            State::Suspended => {
                self.shared.state.set(State::Scheduled);
                true
            }
            State::Running => {
                self.shared.state.set(State::Notified);
                false
            }
            _ => false,
        }
    }

    fn is_finished(&self) -> bool {
        self.shared.state.get().is_finished()
    }
}

/// Spawns a future as a task on the current event loop.
///
/// The task is queued immediately and first runs in the next drain. It does
/// not need to be `Send`: it never leaves the loop thread.
///
/// # Panics
///
/// Panics if no event loop is active on this thread.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let Some(event_loop) = context::current() else {
        panic!("spawn must be called within the context of a runtime");
    };

    let id = TaskId::next();
    let shared = Rc::new(JoinState::new(id));
    let task = Rc::new(Task {
        shared: shared.clone(),
        future: RefCell::new(Some(Box::pin(future))),
        waker: make_waker(id, event_loop.id(), event_loop.reactor().remote().clone()),
        loop_id: event_loop.id(),
    });

    event_loop.register_task(task.clone());
    shared.state.set(State::Scheduled);
    event_loop.scheduler().schedule(task);

    tracing::trace!(task = %id, "task spawned");

    JoinHandle::new(shared)
}

/// Whether cancellation has been requested for the running task.
///
/// Returns `false` outside of a task.
pub fn cancelled() -> bool {
    context::current_task().is_some_and(|task| task.cancelled())
}

/// The id of the running task, if any.
pub fn id() -> Option<TaskId> {
    context::current_task().map(|task| task.id())
}
