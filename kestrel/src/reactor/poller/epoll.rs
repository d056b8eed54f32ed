//! Linux `epoll`-based poller.
//!
//! The poller owns an `epoll` instance, an internal `eventfd` registered as a
//! permanent wake source, and a reusable event buffer. Watcher handles are
//! registered under their handle id, so a readiness event maps straight back
//! to the handle that asked for it.

use super::common::{EventFd, Interest};
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Reserved token for the wake-up eventfd. Handle ids never reach it.
const WAKE_TOKEN: u64 = u64::MAX;

pub(crate) struct EpollPoller {
    epoll: OwnedFd,
    events: Vec<epoll_event>,
    wake: Arc<EventFd>,
}

impl EpollPoller {
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }
        let epoll = unsafe { OwnedFd::from_raw_fd(epoll) };

        let wake = EventFd::new()?;

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll.as_raw_fd(), EPOLL_CTL_ADD, wake.raw(), &mut event) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            epoll,
            events: Vec::with_capacity(64),
            wake: Arc::new(wake),
        })
    }

    /// The eventfd that interrupts [`poll`](Self::poll).
    pub(crate) fn wake_source(&self) -> Arc<EventFd> {
        self.wake.clone()
    }

    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_ADD, fd, token, interest)
    }

    pub(crate) fn reregister(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_MOD, fd, token, interest)
    }

    /// Removes `fd` from the interest list. Errors are ignored: the descriptor
    /// may already have been closed by its owner.
    pub(crate) fn deregister(&self, fd: RawFd) {
        unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            );
        }
    }

    fn ctl(&self, op: i32, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        let rc = unsafe { epoll_ctl(self.epoll.as_raw_fd(), op, fd, &mut event) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Waits for readiness.
    ///
    /// Returns when a registered descriptor becomes ready, the wake source is
    /// signalled, or `timeout` expires. `None` blocks indefinitely. Timeouts
    /// are rounded up to the next millisecond so a due timer is never polled
    /// early.
    pub(crate) fn poll(
        &mut self,
        events: &mut Vec<Event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|t| t.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as i32)
            .unwrap_or(-1);

        events.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let token = ev.u64;

            if token == WAKE_TOKEN {
                self.wake.drain();
                continue;
            }

            let readable = ev.events & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0;
            let writable = ev.events & ((EPOLLOUT | EPOLLERR | EPOLLHUP) as u32) != 0;

            if let Some(e) = events.iter_mut().find(|e| e.token == token) {
                e.readable |= readable;
                e.writable |= writable;
            } else {
                events.push(Event {
                    token,
                    readable,
                    writable,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [0; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        assert_eq!(rc, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn wake_source_interrupts_poll() {
        let mut poller = EpollPoller::new().unwrap();
        let mut events = Vec::new();

        poller.wake_source().wake();
        poller.poll(&mut events, None).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn zero_timeout_returns_immediately() {
        let mut poller = EpollPoller::new().unwrap();
        let mut events = Vec::new();

        poller.poll(&mut events, Some(Duration::ZERO)).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn readable_pipe_reports_its_token() {
        let mut poller = EpollPoller::new().unwrap();
        let (reader, writer) = pipe();
        let mut events = Vec::new();

        poller
            .register(reader.as_raw_fd(), 7, Interest::READABLE)
            .unwrap();
        super::super::common::signal(writer.as_raw_fd());
        poller
            .poll(&mut events, Some(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].token, 7);
        assert!(events[0].readable);

        poller.deregister(reader.as_raw_fd());
    }
}
