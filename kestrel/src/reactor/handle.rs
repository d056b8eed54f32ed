use super::poller::Interest;

use std::os::fd::RawFd;
use std::task::Waker;

/// A loop-owned resource.
///
/// Every handle is in exactly one of three conditions: active (it keeps the
/// loop alive), inactive (open but idle), or closing (scheduled for release in
/// the next closing phase, its callbacks suppressed).
pub(crate) struct Handle {
    pub(crate) kind: HandleKind,
    pub(crate) closing: bool,
}

pub(crate) enum HandleKind {
    /// The scheduler's drain trigger. Its activity is the trigger's arm
    /// state, tracked by the scheduler.
    Trigger,
    Timer(TimerSlot),
    Watch(WatchSlot),
}

#[derive(Default)]
pub(crate) struct TimerSlot {
    pub(crate) waker: Option<Waker>,
    pub(crate) fired: bool,
}

/// A watched descriptor. Each direction has its own waiting task, so one
/// task can wait for readability while another waits for writability.
pub(crate) struct WatchSlot {
    pub(crate) fd: RawFd,
    /// Task waiting for readability.
    pub(crate) reader: Option<Waker>,
    /// Task waiting for writability.
    pub(crate) writer: Option<Waker>,
    /// Interest currently registered with the poller.
    pub(crate) registered: Option<Interest>,
    /// Readiness observed but not yet consumed by a wait.
    pub(crate) ready: Readiness,
}

impl WatchSlot {
    pub(crate) fn new(fd: RawFd) -> Self {
        Self {
            fd,
            reader: None,
            writer: None,
            registered: None,
            ready: Readiness::default(),
        }
    }

    /// The interest the waiting tasks add up to, if any task waits.
    pub(crate) fn wanted(&self) -> Option<Interest> {
        let interest = Interest {
            read: self.reader.is_some(),
            write: self.writer.is_some(),
        };
        (interest.read || interest.write).then_some(interest)
    }

    /// The waiter slot for a single-direction `interest`.
    pub(crate) fn waiter(&mut self, interest: Interest) -> &mut Option<Waker> {
        if interest.read {
            &mut self.reader
        } else {
            &mut self.writer
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) struct Readiness {
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}

impl Readiness {
    pub(crate) fn satisfies(self, interest: Interest) -> bool {
        (interest.read && self.readable) || (interest.write && self.writable)
    }

    pub(crate) fn clear(&mut self, interest: Interest) {
        if interest.read {
            self.readable = false;
        }
        if interest.write {
            self.writable = false;
        }
    }
}

impl Handle {
    pub(crate) fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            closing: false,
        }
    }

    /// Whether this handle keeps the loop alive.
    pub(crate) fn is_active(&self) -> bool {
        if self.closing {
            return false;
        }

        match &self.kind {
            HandleKind::Trigger => false,
            HandleKind::Timer(slot) => !slot.fired,
            HandleKind::Watch(slot) => slot.wanted().is_some(),
        }
    }

    pub(crate) fn is_trigger(&self) -> bool {
        matches!(self.kind, HandleKind::Trigger)
    }
}
