use crate::reactor::HandleId;
use crate::runtime;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Future returned by [`sleep`].
///
/// The timer is started on the first poll and released when the future is
/// dropped. If [`stop`](crate::stop) closes the timer first, the future never
/// completes.
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    duration: Duration,
    handle: Option<HandleId>,
    done: bool,
}

/// Waits until `duration` has elapsed.
///
/// A zero duration still suspends the task until the next timer phase.
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        duration,
        handle: None,
        done: false,
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.done {
            return Poll::Ready(());
        }

        let Some(event_loop) = runtime::current() else {
            return Poll::Pending;
        };

        match self.handle {
            None => {
                self.handle = event_loop.reactor().start_timer(self.duration, cx.waker());
                Poll::Pending
            }
            Some(id) => match event_loop.reactor().poll_timer(id, cx.waker()) {
                Poll::Ready(()) => {
                    self.handle = None;
                    self.done = true;
                    Poll::Ready(())
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.handle.take() {
            if let Some(event_loop) = runtime::current() {
                event_loop.reactor().close(id);
            }
        }
    }
}
