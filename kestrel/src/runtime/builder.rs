use super::lifecycle;
use super::task;
use crate::error::RuntimeError;

use std::future::Future;

/// Pool size used when neither the builder, the environment nor the OS
/// provides one.
pub const DEFAULT_WORKER_THREADS: usize = 8;

/// Environment variable that overrides the detected pool size.
pub const WORKER_THREADS_ENV: &str = "KESTREL_WORKER_THREADS";

/// Configures the event loop before it is created.
///
/// The worker pool size is resolved when the loop starts running, in this
/// order: [`worker_threads`](Self::worker_threads), then
/// `KESTREL_WORKER_THREADS`, then the detected hardware concurrency, then
/// [`DEFAULT_WORKER_THREADS`].
///
/// ```rust,ignore
/// let answer = RuntimeBuilder::new()
///     .worker_threads(4)
///     .block_on(async { 42 });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    worker_threads: Option<usize>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker pool threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = Some(n);
        self
    }

    /// Creates the event loop on the calling thread.
    pub fn init(self) -> Result<(), RuntimeError> {
        lifecycle::try_init(self.worker_threads)
    }

    /// Creates the event loop and runs it to completion.
    ///
    /// # Panics
    ///
    /// Panics if an event loop already exists.
    pub fn run(self) {
        if let Err(e) = self.clone().init() {
            panic!("cannot run: {e}");
        }
        lifecycle::run(self.worker_threads);
    }

    /// Runs `future` as the first task of a new event loop and returns its
    /// output once the loop has shut down.
    ///
    /// # Panics
    ///
    /// Panics if an event loop already exists, or if the loop was stopped
    /// before `future` completed.
    pub fn block_on<F>(self, future: F) -> F::Output
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        if let Err(e) = self.clone().init() {
            panic!("cannot block_on: {e}");
        }

        let handle = task::spawn(future);
        lifecycle::run(self.worker_threads);

        match handle.try_take() {
            Some(Ok(output)) => output,
            Some(Err(e)) => panic!("block_on future did not complete: {e}"),
            None => panic!("block_on future did not complete"),
        }
    }
}

/// Picks the worker pool size.
///
/// An invalid environment value is logged and ignored.
pub(crate) fn resolve_worker_threads(
    explicit: Option<usize>,
    env: Option<&str>,
    detected: usize,
) -> usize {
    if let Some(n) = explicit {
        return n;
    }

    if let Some(raw) = env {
        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => return n,
            _ => tracing::warn!(value = raw, "ignoring invalid {WORKER_THREADS_ENV}"),
        }
    }

    if detected == 0 {
        DEFAULT_WORKER_THREADS
    } else {
        detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::explicit_wins(Some(3), Some("5"), 12, 3)]
    #[case::env_over_detected(None, Some("5"), 12, 5)]
    #[case::env_whitespace(None, Some(" 6 "), 12, 6)]
    #[case::invalid_env_ignored(None, Some("many"), 12, 12)]
    #[case::zero_env_ignored(None, Some("0"), 12, 12)]
    #[case::detected(None, None, 12, 12)]
    #[case::fallback(None, None, 0, DEFAULT_WORKER_THREADS)]
    fn worker_threads_resolution(
        #[case] explicit: Option<usize>,
        #[case] env: Option<&str>,
        #[case] detected: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(resolve_worker_threads(explicit, env, detected), expected);
    }

    #[test]
    #[should_panic(expected = "worker_threads must be > 0")]
    fn zero_worker_threads_panics() {
        let _ = RuntimeBuilder::new().worker_threads(0);
    }
}
