use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    /// Wakes itself and returns `Pending` once. The wake lands while the
    /// task is running, so the task goes to the back of the ready queue and
    /// runs again in the next drain.
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.0 {
            self.0 = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}

/// Gives every other ready task, and one pass of timers and I/O, a chance to
/// run before the current task continues.
pub async fn yield_now() {
    YieldOnce(false).await
}
