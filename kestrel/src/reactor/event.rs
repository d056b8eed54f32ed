use super::HandleId;

/// Readiness reported by the poller for one watcher handle.
pub(crate) struct Event {
    pub(crate) token: HandleId,
    pub(crate) readable: bool,
    pub(crate) writable: bool,
}
