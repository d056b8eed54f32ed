use super::TaskId;
use crate::reactor::{Remote, RemoteEvent};
use crate::runtime::context;

use std::sync::Arc;
use std::task::{Wake, Waker};

/// The waker handed to every poll of a task.
///
/// Only the task id travels through the waker, so it is `Send` while the task
/// itself stays on the loop thread. A wake on the loop thread reschedules the
/// task directly; a wake from anywhere else goes through the remote queue and
/// is applied in the next remote phase.
struct Notifier {
    task: TaskId,
    loop_id: u64,
    remote: Arc<Remote>,
}

impl Wake for Notifier {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        match context::current() {
            Some(event_loop) if event_loop.id() == self.loop_id => {
                event_loop.wake_task(self.task)
            }
            _ => self.remote.push(RemoteEvent::Wake(self.task)),
        }
    }
}

pub(crate) fn make_waker(task: TaskId, loop_id: u64, remote: Arc<Remote>) -> Waker {
    Waker::from(Arc::new(Notifier {
        task,
        loop_id,
        remote,
    }))
}
