//! The event loop and its lifecycle.
//!
//! There is at most one loop per process, owned by the thread that created
//! it. Its lifecycle is explicit: [`init`] creates it, [`run`] drives it until
//! no work remains and then shuts it down, and [`stop`] asks a running loop to
//! wind down from any thread.

mod context;
mod event_loop;
mod lifecycle;
mod scheduler;

pub(crate) mod builder;
pub(crate) mod yield_now;

pub mod task;

pub(crate) use context::current;

use crate::error::RuntimeError;

use std::future::Future;

/// Creates the event loop on the calling thread.
///
/// # Panics
///
/// Panics if an event loop already exists in this process.
pub fn init() {
    if let Err(e) = try_init() {
        panic!("{e}");
    }
}

/// Creates the event loop on the calling thread, or reports that one
/// already exists.
pub fn try_init() -> Result<(), RuntimeError> {
    lifecycle::try_init(None)
}

/// Runs the event loop until no work remains, then shuts it down.
///
/// Creates the loop first if [`init`] was not called. After `run` returns no
/// loop exists and [`init`] may be called again.
///
/// When `run` returns after [`stop`], tasks still queued have been settled:
/// cancelled ones were resumed one last time, the others were destroyed.
/// Tasks suspended on operations that `stop` closed are destroyed as well.
pub fn run() {
    lifecycle::run(None);
}

/// Requests that the active event loop stop.
///
/// Every open handle is closed before the loop resumes another task, so
/// pending timers, watchers and the drain trigger never fire again. Called
/// between [`init`] and [`run`], no task runs normally: when `run` shuts
/// down, queued tasks that were cancelled are resumed once and the rest are
/// destroyed. Called from a task, the tasks queued behind it are settled
/// the same way.
///
/// Only touches atomics and the loop's eventfd, so it is safe to call from
/// any thread and from a signal handler. Does nothing when no loop is
/// active.
pub fn stop() {
    context::request_stop();
}

/// Runs `future` to completion on a new event loop with default settings.
///
/// # Panics
///
/// Panics if an event loop already exists.
pub fn block_on<F>(future: F) -> F::Output
where
    F: Future + 'static,
    F::Output: 'static,
{
    builder::RuntimeBuilder::new().block_on(future)
}
