use super::event_loop::EventLoop;
use super::task::Resumable;
use crate::error::RuntimeError;
use crate::reactor::signal;

use std::cell::RefCell;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

thread_local! {
    /// The event loop owned by this thread, if it is the loop thread.
    static CURRENT_LOOP: RefCell<Option<Rc<EventLoop>>> = const { RefCell::new(None) };

    /// The task being polled right now.
    static CURRENT_TASK: RefCell<Option<Rc<dyn Resumable>>> = const { RefCell::new(None) };
}

/// Set while an event loop exists anywhere in the process.
static ACTIVE: AtomicBool = AtomicBool::new(false);

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// The active loop's eventfd, or `-1`.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn current() -> Option<Rc<EventLoop>> {
    CURRENT_LOOP.with(|cell| cell.borrow().clone())
}

pub(crate) fn current_task() -> Option<Rc<dyn Resumable>> {
    CURRENT_TASK.with(|cell| cell.borrow().clone())
}

/// Runs `f` with `task` installed as the current task, restoring the
/// previous one afterwards.
pub(crate) fn enter_task<R>(task: Rc<dyn Resumable>, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_TASK.with(|cell| cell.replace(Some(task)));
    let out = f();
    let task = CURRENT_TASK.with(|cell| cell.replace(prev));
    drop(task);
    out
}

/// Claims the process-wide loop slot.
pub(crate) fn claim() -> Result<(), RuntimeError> {
    ACTIVE
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|_| RuntimeError::AlreadyInitialized)
}

pub(crate) fn next_loop_id() -> u64 {
    NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Installs a freshly claimed loop on this thread.
pub(crate) fn install(event_loop: Rc<EventLoop>) {
    STOP_REQUESTED.store(false, Ordering::SeqCst);
    WAKE_FD.store(event_loop.reactor().remote().wake_fd(), Ordering::SeqCst);
    CURRENT_LOOP.with(|cell| *cell.borrow_mut() = Some(event_loop));
}

/// Uninstalls this thread's loop and frees the process-wide slot.
pub(crate) fn teardown() {
    WAKE_FD.store(-1, Ordering::SeqCst);

    let event_loop = CURRENT_LOOP.with(|cell| cell.borrow_mut().take());
    drop(event_loop);

    STOP_REQUESTED.store(false, Ordering::SeqCst);
    ACTIVE.store(false, Ordering::Release);
}

/// Releases a claim whose loop was never installed.
pub(crate) fn release_claim() {
    ACTIVE.store(false, Ordering::Release);
}

/// Requests that the active loop stop.
///
/// Only touches atomics and calls `write(2)`, so it is safe from any thread
/// and from a signal handler. With no active loop it does nothing.
pub(crate) fn request_stop() {
    if !ACTIVE.load(Ordering::Acquire) {
        return;
    }

    STOP_REQUESTED.store(true, Ordering::SeqCst);

    let fd: RawFd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        signal(fd);
    }
}

pub(crate) fn stop_pending() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn take_stop_request() -> bool {
    STOP_REQUESTED.swap(false, Ordering::SeqCst)
}
