use crate::error::OperationError;
use crate::reactor::{HandleId, Interest};
use crate::runtime;

use std::future::Future;
use std::os::fd::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Watches a file descriptor for readiness on the event loop.
///
/// The watcher does not own the descriptor; the caller keeps it open for as
/// long as the watcher exists. While a task awaits readiness the watcher keeps
/// the loop alive. [`stop`](crate::stop) closes it, after which every wait
/// fails with [`OperationError::Shutdown`].
///
/// One task may wait for [`readable`](Watcher::readable) while another waits
/// for [`writable`](Watcher::writable) on the same watcher. Within a
/// direction only the most recently polled wait is woken.
pub struct Watcher {
    fd: RawFd,
    handle: HandleId,
}

impl Watcher {
    /// Registers `fd` with the current event loop.
    pub fn new(fd: &impl AsRawFd) -> Result<Self, OperationError> {
        let fd = fd.as_raw_fd();
        let event_loop = runtime::current().ok_or(OperationError::Shutdown)?;
        let handle = event_loop
            .reactor()
            .open_watch(fd)
            .ok_or(OperationError::Shutdown)?;

        Ok(Self { fd, handle })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Resolves once the descriptor is readable, or has hung up.
    pub fn readable(&self) -> Readiness<'_> {
        Readiness {
            watcher: self,
            interest: Interest::READABLE,
            waiting: false,
        }
    }

    /// Resolves once the descriptor is writable.
    pub fn writable(&self) -> Readiness<'_> {
        Readiness {
            watcher: self,
            interest: Interest::WRITABLE,
            waiting: false,
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if let Some(event_loop) = runtime::current() {
            event_loop.reactor().close(self.handle);
        }
    }
}

/// Future returned by [`Watcher::readable`] and [`Watcher::writable`].
#[must_use = "futures do nothing unless polled"]
pub struct Readiness<'a> {
    watcher: &'a Watcher,
    interest: Interest,
    waiting: bool,
}

impl Future for Readiness<'_> {
    type Output = Result<(), OperationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(event_loop) = runtime::current() else {
            return Poll::Ready(Err(OperationError::Shutdown));
        };

        let poll = event_loop
            .reactor()
            .poll_watch(self.watcher.handle, self.interest, cx.waker());
        self.waiting = poll.is_pending();
        poll
    }
}

impl Drop for Readiness<'_> {
    fn drop(&mut self) {
        if !self.waiting {
            return;
        }

        if let Some(event_loop) = runtime::current() {
            event_loop
                .reactor()
                .clear_watch(self.watcher.handle, self.interest);
        }
    }
}
