use super::task::Resumable;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

/// Arm state of the drain trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Trigger {
    Disarmed,
    /// A drain runs in the next loop iteration, and the poll phase does not
    /// block.
    Armed,
    /// Closed by `stop()`. Never fires again.
    Closed,
}

/// The FIFO ready queue and the trigger that drains it.
///
/// Tasks scheduled while a drain is in progress land in the next batch, so a
/// task that keeps rescheduling itself cannot starve I/O or timers.
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<Rc<dyn Resumable>>>,
    trigger: Cell<Trigger>,
}

impl Scheduler {
    /// Creates a scheduler whose trigger starts armed, so the first loop
    /// iteration always drains.
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            trigger: Cell::new(Trigger::Armed),
        }
    }

    /// Appends a task to the ready queue, arming the trigger if it was idle.
    pub(crate) fn schedule(&self, task: Rc<dyn Resumable>) {
        let mut queue = self.queue.borrow_mut();

        if queue.is_empty() && self.trigger.get() == Trigger::Disarmed {
            self.trigger.set(Trigger::Armed);
        }

        queue.push_back(task);
    }

    /// Resumes every task that was queued when the drain began, in order.
    ///
    /// `stop_requested` is checked before each resume. Once it returns
    /// `true` the rest of the batch goes back to the front of the queue, in
    /// order, ahead of anything scheduled during the drain.
    ///
    /// The trigger is disarmed afterwards only if nothing was scheduled in
    /// the meantime. Returns the number of tasks resumed.
    pub(crate) fn drain(&self, stop_requested: impl Fn() -> bool) -> usize {
        let mut batch = mem::take(&mut *self.queue.borrow_mut());
        let mut resumed = 0;

        while let Some(task) = batch.pop_front() {
            if stop_requested() {
                batch.push_front(task);
                break;
            }

            task.resume();
            resumed += 1;
        }

        if !batch.is_empty() {
            let mut queue = self.queue.borrow_mut();
            tracing::trace!(requeued = batch.len(), "drain interrupted by stop");
            while let Some(task) = batch.pop_back() {
                queue.push_front(task);
            }
        }

        if self.queue.borrow().is_empty() && self.trigger.get() == Trigger::Armed {
            self.trigger.set(Trigger::Disarmed);
        }

        if resumed > 0 {
            tracing::trace!(resumed, "ready queue drained");
        }

        resumed
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.trigger.get() == Trigger::Armed
    }

    #[cfg(test)]
    pub(crate) fn trigger(&self) -> Trigger {
        self.trigger.get()
    }

    /// Closes the trigger. Scheduling still queues tasks, but no drain runs.
    pub(crate) fn close(&self) {
        self.trigger.set(Trigger::Closed);
    }

    pub(crate) fn take_queue(&self) -> VecDeque<Rc<dyn Resumable>> {
        mem::take(&mut *self.queue.borrow_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::task::TaskId;

    type Log = Rc<RefCell<Vec<u64>>>;

    struct Recorder {
        id: u64,
        log: Log,
        hook: RefCell<Option<Box<dyn FnOnce()>>>,
    }

    impl Recorder {
        fn new(id: u64, log: &Log) -> Rc<Self> {
            Rc::new(Self {
                id,
                log: log.clone(),
                hook: RefCell::new(None),
            })
        }

        fn with_hook(id: u64, log: &Log, hook: impl FnOnce() + 'static) -> Rc<Self> {
            let recorder = Recorder::new(id, log);
            *recorder.hook.borrow_mut() = Some(Box::new(hook));
            recorder
        }
    }

    impl Resumable for Recorder {
        fn id(&self) -> TaskId {
            TaskId(self.id)
        }

        fn resume(self: Rc<Self>) {
            self.log.borrow_mut().push(self.id);
            let hook = self.hook.borrow_mut().take();
            if let Some(hook) = hook {
                hook();
            }
        }

        fn destroy(self: Rc<Self>) {}

        fn cancelled(&self) -> bool {
            false
        }

        fn notify(&self) -> bool {
            false
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    #[test]
    fn starts_armed_and_disarms_after_empty_drain() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_armed());

        assert_eq!(scheduler.drain(|| false), 0);
        assert_eq!(scheduler.trigger(), Trigger::Disarmed);
    }

    #[test]
    fn schedule_arms_disarmed_trigger() {
        let scheduler = Scheduler::new();
        let log = Log::default();
        scheduler.drain(|| false);

        scheduler.schedule(Recorder::new(1, &log));

        assert!(scheduler.is_armed());
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn tasks_scheduled_during_drain_run_in_next_drain() {
        let scheduler = Rc::new(Scheduler::new());
        let log = Log::default();

        let d = Recorder::new(4, &log);
        let a = {
            let scheduler = scheduler.clone();
            Recorder::with_hook(1, &log, move || scheduler.schedule(d))
        };

        scheduler.schedule(a);
        scheduler.schedule(Recorder::new(2, &log));
        scheduler.schedule(Recorder::new(3, &log));

        assert_eq!(scheduler.drain(|| false), 3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert!(scheduler.is_armed());

        assert_eq!(scheduler.drain(|| false), 1);
        assert_eq!(*log.borrow(), vec![1, 2, 3, 4]);
        assert!(!scheduler.is_armed());
    }

    #[test]
    fn stop_during_drain_requeues_the_rest_in_order() {
        let scheduler = Rc::new(Scheduler::new());
        let log = Log::default();
        let stopped = Rc::new(Cell::new(false));

        let late = Recorder::new(4, &log);
        let first = {
            let (scheduler, stopped) = (scheduler.clone(), stopped.clone());
            Recorder::with_hook(1, &log, move || {
                scheduler.schedule(late);
                stopped.set(true);
            })
        };

        scheduler.schedule(first);
        scheduler.schedule(Recorder::new(2, &log));
        scheduler.schedule(Recorder::new(3, &log));

        assert_eq!(scheduler.drain(|| stopped.get()), 1);
        assert_eq!(*log.borrow(), vec![1]);

        let queued: Vec<_> = scheduler.take_queue().iter().map(|t| t.id().0).collect();
        assert_eq!(queued, vec![2, 3, 4]);
    }

    #[test]
    fn closed_trigger_stays_closed() {
        let scheduler = Scheduler::new();
        let log = Log::default();

        scheduler.close();
        scheduler.schedule(Recorder::new(1, &log));

        assert_eq!(scheduler.trigger(), Trigger::Closed);
        assert_eq!(scheduler.take_queue().len(), 1);
        assert_eq!(scheduler.len(), 0);
    }
}
