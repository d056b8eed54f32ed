use super::event::Event;
use super::handle::{Handle, HandleKind, TimerSlot, WatchSlot};
use super::poller::{Interest, Poller};
use super::remote::{Remote, RemoteEvent, WorkOutcome};
use super::timer::TimerEntry;
use super::{HandleId, RequestId, next_id};
use crate::error::{Fatal, OperationError, abort};

use std::cell::RefCell;
use std::collections::{BTreeMap, BinaryHeap, HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::task::{Poll, Waker};
use std::time::{Duration, Instant};

/// Invoked on the loop thread when a pool request completes.
pub(crate) type Completion = Box<dyn FnOnce(WorkOutcome)>;

/// Loop-thread bookkeeping for handles, timers and in-flight pool requests.
///
/// All methods run on the loop thread. Wakers are always collected first and
/// invoked after the internal borrow is released, since waking a task may
/// re-enter the reactor.
pub(crate) struct Reactor {
    inner: RefCell<Inner>,
    poller: RefCell<Poller>,
    remote: Arc<Remote>,
}

struct Inner {
    /// Loop time, cached at the start of each iteration.
    now: Instant,

    /// Every open handle, including those waiting for the closing phase.
    handles: BTreeMap<HandleId, Handle>,

    /// Pending timer deadlines. Entries of closed or fired timers are skipped
    /// lazily when they reach the top.
    timers: BinaryHeap<TimerEntry>,

    /// Handles released in the next closing phase.
    closing: Vec<HandleId>,

    /// Completion callbacks of pool requests whose awaiter is still alive.
    requests: HashMap<RequestId, Completion>,

    /// Pool requests whose worker has not reported back yet. Forgotten
    /// requests stay counted here.
    in_flight: usize,

    /// Event buffer reused across polls.
    events: Vec<Event>,

    /// Set by [`Reactor::close_loop`]. No handle or request opens afterwards.
    closed: bool,
}

impl Reactor {
    pub(crate) fn new() -> io::Result<Self> {
        let poller = Poller::new()?;
        let remote = Arc::new(Remote::new(poller.wake_source()));

        Ok(Self {
            inner: RefCell::new(Inner {
                now: Instant::now(),
                handles: BTreeMap::new(),
                timers: BinaryHeap::new(),
                closing: Vec::new(),
                requests: HashMap::new(),
                in_flight: 0,
                events: Vec::with_capacity(64),
                closed: false,
            }),
            poller: RefCell::new(poller),
            remote,
        })
    }

    /// The queue other threads use to reach this loop.
    pub(crate) fn remote(&self) -> &Arc<Remote> {
        &self.remote
    }

    /// Refreshes the cached loop time.
    pub(crate) fn update_time(&self) {
        self.inner.borrow_mut().now = Instant::now();
    }

    /// Opens a handle, unless the loop has closed.
    fn insert(&self, kind: HandleKind) -> Option<HandleId> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return None;
        }

        let id = next_id();
        inner.handles.insert(id, Handle::new(kind));
        Some(id)
    }

    /// Opens the handle standing for the scheduler's drain trigger, so that
    /// `stop()` finds it in the handle walk.
    pub(crate) fn open_trigger(&self) -> Option<HandleId> {
        self.insert(HandleKind::Trigger)
    }

    /// Starts a one-shot timer due `duration` after the cached loop time.
    ///
    /// Returns `None` once the loop has closed.
    pub(crate) fn start_timer(&self, duration: Duration, waker: &Waker) -> Option<HandleId> {
        let id = self.insert(HandleKind::Timer(TimerSlot {
            waker: Some(waker.clone()),
            fired: false,
        }))?;

        let mut inner = self.inner.borrow_mut();
        let deadline = inner.now + duration;
        inner.timers.push(TimerEntry {
            deadline,
            seq: id,
            handle: id,
        });

        Some(id)
    }

    /// Checks a timer started by [`start_timer`](Self::start_timer).
    ///
    /// A fired timer is released and reports ready. A timer closed by
    /// [`close`](Self::close) never fires.
    pub(crate) fn poll_timer(&self, id: HandleId, waker: &Waker) -> Poll<()> {
        let mut inner = self.inner.borrow_mut();

        let fired = match inner.handles.get_mut(&id) {
            Some(Handle {
                kind: HandleKind::Timer(slot),
                closing: false,
            }) => {
                if !slot.fired {
                    match &slot.waker {
                        Some(current) if current.will_wake(waker) => {}
                        _ => slot.waker = Some(waker.clone()),
                    }
                }
                slot.fired
            }
            Some(Handle { closing: false, .. }) => {
                abort(Fatal::Programming("handle is not a timer"));
            }
            _ => false,
        };

        if !fired {
            return Poll::Pending;
        }

        inner.handles.remove(&id);
        Poll::Ready(())
    }

    /// Fires every timer whose deadline is at or before the cached time.
    pub(crate) fn run_timers(&self) -> usize {
        let due = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let mut due = Vec::new();

            while let Some(entry) = inner.timers.peek() {
                if entry.deadline > inner.now {
                    break;
                }

                let handle = entry.handle;
                inner.timers.pop();

                if let Some(Handle {
                    kind: HandleKind::Timer(slot),
                    closing: false,
                }) = inner.handles.get_mut(&handle)
                {
                    slot.fired = true;
                    if let Some(waker) = slot.waker.take() {
                        due.push(waker);
                    }
                }
            }

            due
        };

        let fired = due.len();
        for waker in due {
            waker.wake();
        }

        fired
    }

    /// The earliest live timer deadline. Stale heap entries are discarded.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;

        while let Some(entry) = inner.timers.peek() {
            let (deadline, id) = (entry.deadline, entry.handle);

            match inner.handles.get(&id) {
                Some(handle) if handle.is_active() => return Some(deadline),
                _ => {
                    inner.timers.pop();
                }
            }
        }

        None
    }

    /// Opens an idle watcher on `fd`. Nothing is registered with the poller
    /// until a task waits on it.
    pub(crate) fn open_watch(&self, fd: RawFd) -> Option<HandleId> {
        self.insert(HandleKind::Watch(WatchSlot::new(fd)))
    }

    /// Waits for `interest`, a single direction, on a watcher handle.
    ///
    /// Each direction holds one waiter: a second wait in the same direction
    /// replaces the first one's waker. The watch is one-shot per direction:
    /// once it fires, that direction is dropped from the poller until the
    /// next call. A closed handle reports [`OperationError::Shutdown`].
    pub(crate) fn poll_watch(
        &self,
        id: HandleId,
        interest: Interest,
        waker: &Waker,
    ) -> Poll<Result<(), OperationError>> {
        let mut inner = self.inner.borrow_mut();

        let handle = match inner.handles.get_mut(&id) {
            Some(handle) if !handle.closing => handle,
            _ => return Poll::Ready(Err(OperationError::Shutdown)),
        };
        let HandleKind::Watch(slot) = &mut handle.kind else {
            abort(Fatal::Programming("handle is not a watcher"));
        };

        if slot.ready.satisfies(interest) {
            slot.ready.clear(interest);
            return Poll::Ready(Ok(()));
        }

        *slot.waiter(interest) = Some(waker.clone());

        if let Err(e) = sync_watch(&self.poller.borrow(), id, slot) {
            *slot.waiter(interest) = None;
            return Poll::Ready(Err(e.into()));
        }

        Poll::Pending
    }

    /// Drops the waiter for one direction of a watcher. The watcher becomes
    /// inactive once no direction has a waiter.
    pub(crate) fn clear_watch(&self, id: HandleId, interest: Interest) {
        let mut inner = self.inner.borrow_mut();

        if let Some(Handle {
            kind: HandleKind::Watch(slot),
            closing: false,
        }) = inner.handles.get_mut(&id)
        {
            *slot.waiter(interest) = None;
            if let Err(e) = sync_watch(&self.poller.borrow(), id, slot) {
                tracing::trace!(handle = id, error = %e, "failed to narrow watch");
            }
        }
    }

    /// Marks a handle as closing. It is released in the next closing phase
    /// and none of its callbacks fire in the meantime.
    pub(crate) fn close(&self, id: HandleId) {
        let mut inner = self.inner.borrow_mut();

        let Some(handle) = inner.handles.get_mut(&id) else {
            return;
        };
        if handle.closing {
            return;
        }
        handle.closing = true;

        match &mut handle.kind {
            HandleKind::Trigger => {}
            HandleKind::Timer(slot) => slot.waker = None,
            HandleKind::Watch(slot) => {
                slot.reader = None;
                slot.writer = None;
                if slot.registered.take().is_some() {
                    self.poller.borrow().deregister(slot.fd);
                }
            }
        }

        inner.closing.push(id);
    }

    /// Handles that are open and not already closing, with whether each is
    /// the drain trigger.
    pub(crate) fn open_handles(&self) -> Vec<(HandleId, bool)> {
        self.inner
            .borrow()
            .handles
            .iter()
            .filter(|(_, handle)| !handle.closing)
            .map(|(id, handle)| (*id, handle.is_trigger()))
            .collect()
    }

    /// Whether any timer or watcher still keeps the loop alive.
    pub(crate) fn has_active(&self) -> bool {
        self.inner.borrow().handles.values().any(Handle::is_active)
    }

    /// Whether the next closing phase has handles to release.
    pub(crate) fn has_closing(&self) -> bool {
        !self.inner.borrow().closing.is_empty()
    }

    /// Releases every handle closed since the last closing phase.
    pub(crate) fn run_closing(&self) -> usize {
        let released = {
            let mut inner = self.inner.borrow_mut();
            let ids = std::mem::take(&mut inner.closing);
            ids.into_iter()
                .filter_map(|id| inner.handles.remove(&id))
                .collect::<Vec<_>>()
        };

        released.len()
    }

    /// Registers a pool request. `on_complete` runs on the loop thread when
    /// the outcome arrives, unless the request is forgotten first.
    pub(crate) fn begin_request(&self, on_complete: Completion) -> Option<RequestId> {
        let mut inner = self.inner.borrow_mut();
        if inner.closed {
            return None;
        }

        let id = next_id();
        inner.requests.insert(id, on_complete);
        inner.in_flight += 1;
        Some(id)
    }

    /// Drops the completion callback. The request stays in flight until its
    /// worker reports back.
    pub(crate) fn forget_request(&self, id: RequestId) {
        let callback = self.inner.borrow_mut().requests.remove(&id);
        drop(callback);
    }

    /// Retires a request that was never handed to a worker.
    pub(crate) fn abandon_request(&self, id: RequestId) {
        let callback = {
            let mut inner = self.inner.borrow_mut();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.requests.remove(&id)
        };
        drop(callback);
    }

    /// Pool requests still owned by a worker.
    pub(crate) fn in_flight(&self) -> usize {
        self.inner.borrow().in_flight
    }

    fn complete(&self, id: RequestId, outcome: WorkOutcome) {
        let callback = {
            let mut inner = self.inner.borrow_mut();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.requests.remove(&id)
        };

        if let Some(callback) = callback {
            callback(outcome);
        }
    }

    /// Waits for readiness and wakes the watchers that became ready.
    pub(crate) fn poll_io(&self, timeout: Option<Duration>) -> io::Result<()> {
        let mut events = std::mem::take(&mut self.inner.borrow_mut().events);
        let polled = self.poller.borrow_mut().poll(&mut events, timeout);

        let mut ready = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();

            for event in &events {
                let Some(Handle {
                    kind: HandleKind::Watch(slot),
                    closing: false,
                }) = inner.handles.get_mut(&event.token)
                else {
                    continue;
                };

                if event.readable {
                    if let Some(waker) = slot.reader.take() {
                        slot.ready.readable = true;
                        ready.push(waker);
                    }
                }
                if event.writable {
                    if let Some(waker) = slot.writer.take() {
                        slot.ready.writable = true;
                        ready.push(waker);
                    }
                }

                if let Err(e) = sync_watch(&self.poller.borrow(), event.token, slot) {
                    tracing::trace!(handle = event.token, error = %e, "failed to narrow watch");
                }
            }

            inner.events = events;
        }

        for waker in ready {
            waker.wake();
        }

        polled
    }

    /// Takes everything queued by other threads since the last call.
    pub(crate) fn take_remote(&self) -> VecDeque<RemoteEvent> {
        self.remote.take()
    }

    /// Applies a pool completion on the loop thread.
    pub(crate) fn deliver(&self, request: RequestId, outcome: WorkOutcome) {
        self.complete(request, outcome);
    }

    /// Closes the loop. Fails while handles or requests remain.
    pub(crate) fn close_loop(&self) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();

        if !inner.handles.is_empty() || inner.in_flight > 0 {
            return Err(io::Error::new(
                io::ErrorKind::ResourceBusy,
                format!(
                    "{} handles and {} requests still open",
                    inner.handles.len(),
                    inner.in_flight
                ),
            ));
        }

        inner.closed = true;
        inner.timers.clear();
        self.remote.close();
        Ok(())
    }
}

/// Brings the poller registration of a watcher in line with its waiters.
fn sync_watch(poller: &Poller, id: HandleId, slot: &mut WatchSlot) -> io::Result<()> {
    let wanted = slot.wanted();
    if wanted == slot.registered {
        return Ok(());
    }

    match (slot.registered, wanted) {
        (None, Some(interest)) => poller.register(slot.fd, id, interest)?,
        (Some(_), Some(interest)) => poller.reregister(slot.fd, id, interest)?,
        (Some(_), None) => poller.deregister(slot.fd),
        (None, None) => {}
    }

    slot.registered = wanted;
    Ok(())
}
