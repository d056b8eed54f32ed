use super::context;
use super::scheduler::Scheduler;
use super::task::{Resumable, TaskId};
use crate::pool::{Job, WorkerPool};
use crate::reactor::{Reactor, RemoteEvent};

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Counts reported by [`EventLoop::finalize`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Finalized {
    /// Cancelled tasks given one last resume.
    pub(crate) resumed: usize,
    /// Queued tasks dropped without running.
    pub(crate) destroyed: usize,
    /// Suspended tasks whose operations were closed under them.
    pub(crate) abandoned: usize,
}

/// The single-threaded event loop: scheduler, reactor, task registry and the
/// worker pool.
pub(crate) struct EventLoop {
    /// Distinguishes this loop from earlier loops in the process. Tasks
    /// and wakers carry it to detect use across loop generations.
    id: u64,

    /// Ready queue and drain trigger.
    scheduler: Scheduler,

    /// Handles, timers, the poller and pool request bookkeeping.
    reactor: Reactor,

    /// Every task that has not completed or been destroyed, queued or not.
    tasks: RefCell<BTreeMap<TaskId, Rc<dyn Resumable>>>,

    /// Started by `run()`, joined by [`close`](EventLoop::close).
    pool: RefCell<Option<WorkerPool>>,

    /// Pool size requested through the builder, if any.
    worker_threads: Option<usize>,

    /// Set once `run()` has started driving this loop.
    running: Cell<bool>,
}

impl EventLoop {
    /// Creates the loop with its trigger open and armed. The worker pool is
    /// started later, by `run()`.
    pub(crate) fn new(id: u64, worker_threads: Option<usize>) -> io::Result<Self> {
        let reactor = Reactor::new()?;
        reactor.open_trigger();

        Ok(Self {
            id,
            scheduler: Scheduler::new(),
            reactor,
            tasks: RefCell::new(BTreeMap::new()),
            pool: RefCell::new(None),
            worker_threads,
            running: Cell::new(false),
        })
    }

    /// The loop generation id.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The ready queue tasks are scheduled on.
    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The reactor owning this loop's handles and pool requests.
    pub(crate) fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Pool size set through the builder, before the environment and
    /// hardware fallbacks apply.
    pub(crate) fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    /// Adds a freshly spawned task to the registry.
    pub(crate) fn register_task(&self, task: Rc<dyn Resumable>) {
        self.tasks.borrow_mut().insert(task.id(), task);
    }

    /// Removes a finished task from the registry. The task is dropped
    /// outside the registry borrow.
    pub(crate) fn release_task(&self, id: TaskId) {
        let task = self.tasks.borrow_mut().remove(&id);
        drop(task);
    }

    /// Applies a wake-up to a task owned by this loop.
    pub(crate) fn wake_task(&self, id: TaskId) {
        let task = self.tasks.borrow().get(&id).cloned();

        if let Some(task) = task {
            if task.notify() {
                self.scheduler.schedule(task);
            }
        }
    }

    /// Spawns the worker pool with `threads` threads.
    pub(crate) fn start_pool(&self, threads: usize) -> io::Result<()> {
        let pool = WorkerPool::new(threads)?;
        tracing::debug!(threads = pool.size(), "worker pool started");
        *self.pool.borrow_mut() = Some(pool);
        Ok(())
    }

    /// Hands a job to the worker pool. Gives the job back if no pool runs.
    pub(crate) fn submit(&self, job: Job) -> Result<(), Job> {
        match self.pool.borrow().as_ref() {
            Some(pool) => {
                pool.push(job);
                Ok(())
            }
            None => Err(job),
        }
    }

    /// Marks the loop as running. Returns `false` if it already was.
    pub(crate) fn enter_run(&self) -> bool {
        !self.running.replace(true)
    }

    /// Whether another iteration has anything to do.
    pub(crate) fn alive(&self) -> bool {
        self.scheduler.is_armed()
            || self.reactor.has_active()
            || self.reactor.in_flight() > 0
            || self.reactor.has_closing()
    }

    /// Runs iterations until the loop has no active work left.
    pub(crate) fn drive(&self) -> io::Result<()> {
        while self.alive() {
            self.turn()?;
        }

        Ok(())
    }

    /// One loop iteration: pending stop, timers, drain, poll, remote events,
    /// closing.
    ///
    /// A stop requested before the iteration closes the trigger ahead of the
    /// drain, and a stop requested by a task interrupts the drain it runs in.
    /// Either way the tasks still queued are left for [`finalize`].
    ///
    /// [`finalize`]: EventLoop::finalize
    fn turn(&self) -> io::Result<()> {
        self.reactor.update_time();
        self.apply_stop();
        self.reactor.run_timers();

        if self.scheduler.is_armed() {
            self.scheduler.drain(context::stop_pending);
            self.apply_stop();
        }

        let timeout = self.poll_timeout();
        self.reactor.poll_io(timeout)?;

        self.deliver_remote();
        self.reactor.run_closing();

        Ok(())
    }

    fn poll_timeout(&self) -> Option<Duration> {
        if self.scheduler.is_armed() || self.reactor.has_closing() || context::stop_pending() {
            return Some(Duration::ZERO);
        }

        if let Some(deadline) = self.reactor.next_deadline() {
            return Some(deadline.saturating_duration_since(Instant::now()));
        }

        if self.reactor.has_active() || self.reactor.in_flight() > 0 {
            return None;
        }

        Some(Duration::ZERO)
    }

    fn deliver_remote(&self) {
        for event in self.reactor.take_remote() {
            match event {
                RemoteEvent::Completed { request, outcome } => {
                    self.reactor.deliver(request, outcome)
                }
                RemoteEvent::Wake(task) => self.wake_task(task),
            }
        }

        self.apply_stop();
    }

    /// Walks the open handles if a stop was requested since the last check.
    fn apply_stop(&self) {
        if context::take_stop_request() {
            tracing::debug!(queued = self.scheduler.len(), "stop requested");
            self.close_handles();
        }
    }

    /// Closes every open handle. Closed handles never fire, and the drain
    /// trigger never runs again.
    pub(crate) fn close_handles(&self) {
        let handles = self.reactor.open_handles();
        let count = handles.len();

        for (id, is_trigger) in handles {
            if is_trigger {
                self.scheduler.close();
            }
            self.reactor.close(id);
        }

        if count > 0 {
            tracing::debug!(handles = count, "closing loop handles");
        }
    }

    /// Closes the reactor and joins the worker pool.
    pub(crate) fn close(&self) -> io::Result<()> {
        self.reactor.close_loop()?;

        let pool = self.pool.borrow_mut().take();
        if let Some(mut pool) = pool {
            pool.shutdown();
        }

        Ok(())
    }

    /// Settles every task still owned by the loop after it closed.
    ///
    /// Queued tasks are processed in FIFO order: a cancelled task is resumed
    /// once so it can observe its flag, and destroyed if that resume did not
    /// finish it; any other queued task is destroyed without running. Tasks
    /// still suspended on a closed operation are destroyed last.
    pub(crate) fn finalize(&self) -> Finalized {
        let mut report = Finalized::default();

        for task in self.scheduler.take_queue() {
            if task.cancelled() {
                report.resumed += 1;
                task.clone().resume();
                if !task.is_finished() {
                    task.destroy();
                }
            } else {
                report.destroyed += 1;
                task.destroy();
            }
        }

        loop {
            let leftover: Vec<_> = self.tasks.borrow().values().cloned().collect();
            if leftover.is_empty() {
                break;
            }

            for task in leftover {
                report.abandoned += 1;
                let id = task.id();
                task.destroy();
                self.release_task(id);
            }
        }

        self.scheduler.take_queue();
        report
    }
}
