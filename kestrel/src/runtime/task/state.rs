/// Lifecycle of a task.
///
/// ```text
/// Created -> Scheduled -> Running -> Suspended -> Scheduled -> ...
///                            |  \-> Notified  -> Scheduled
///                            \-> Completed
/// any state but Running/Notified -> Destroyed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    /// Registered but not yet handed to the scheduler.
    Created,

    /// In the ready queue, waiting for the next drain.
    Scheduled,

    /// Being polled on the loop thread.
    Running,

    /// Woken while running; goes straight back to the queue once the
    /// current poll returns.
    Notified,

    /// Waiting for an operation to wake it.
    Suspended,

    /// Ran to completion. The output sits in the join state.
    Completed,

    /// Dropped without completing.
    Destroyed,
}

impl State {
    pub(crate) fn is_finished(self) -> bool {
        matches!(self, State::Completed | State::Destroyed)
    }
}
