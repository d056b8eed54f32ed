use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Readiness a watcher asks the poller for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Interest {
    pub(crate) const READABLE: Interest = Interest {
        read: true,
        write: false,
    };

    pub(crate) const WRITABLE: Interest = Interest {
        read: false,
        write: true,
    };
}

/// A non-blocking `eventfd` that interrupts a blocked poll.
///
/// Writes are safe from any thread and from signal handlers.
pub(crate) struct EventFd(OwnedFd);

impl EventFd {
    pub(crate) fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self(unsafe { OwnedFd::from_raw_fd(fd) }))
    }

    pub(crate) fn raw(&self) -> RawFd {
        self.0.as_raw_fd()
    }

    /// Signals the poller.
    pub(crate) fn wake(&self) {
        signal(self.raw());
    }

    /// Clears the pending counter.
    pub(crate) fn drain(&self) {
        let mut buf = 0u64;
        unsafe {
            libc::read(self.raw(), &mut buf as *mut u64 as *mut _, 8);
        }
    }
}

/// Writes one tick to a raw eventfd. Only calls `write(2)`.
pub(crate) fn signal(fd: RawFd) {
    let buf: u64 = 1;
    unsafe {
        libc::write(fd, &buf as *const u64 as *const _, 8);
    }
}
