use super::builder::{DEFAULT_WORKER_THREADS, WORKER_THREADS_ENV, resolve_worker_threads};
use super::context;
use super::event_loop::EventLoop;
use crate::error::{Fatal, RuntimeError, abort};

use std::env;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::thread;

/// Creates the process-wide event loop on the calling thread.
pub(crate) fn try_init(worker_threads: Option<usize>) -> Result<(), RuntimeError> {
    context::claim()?;

    let event_loop = match EventLoop::new(context::next_loop_id(), worker_threads) {
        Ok(event_loop) => event_loop,
        Err(source) => {
            context::release_claim();
            abort(Fatal::Environment {
                op: "event loop initialization",
                source,
            });
        }
    };

    tracing::debug!(id = event_loop.id(), "event loop initialized");
    context::install(Rc::new(event_loop));
    Ok(())
}

/// Uninstalls the loop when `run` returns or unwinds.
struct Teardown;

impl Drop for Teardown {
    fn drop(&mut self) {
        context::teardown();
    }
}

/// Runs the loop until no work remains, then shuts down.
///
/// Shutdown runs every remaining iteration needed to release the closed
/// handles, closes the loop, joins the worker pool and finally settles the
/// leftover tasks.
pub(crate) fn run(worker_threads: Option<usize>) {
    let event_loop = match context::current() {
        Some(event_loop) => event_loop,
        None => {
            if let Err(e) = try_init(worker_threads) {
                panic!("cannot run: {e}");
            }
            match context::current() {
                Some(event_loop) => event_loop,
                None => abort(Fatal::Programming("event loop missing after init")),
            }
        }
    };

    if !event_loop.enter_run() {
        abort(Fatal::Programming("run() called while the loop is already running"));
    }

    let _teardown = Teardown;

    let threads = resolve_worker_threads(
        event_loop.worker_threads(),
        env::var(WORKER_THREADS_ENV).ok().as_deref(),
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(DEFAULT_WORKER_THREADS),
    );

    if let Err(source) = event_loop.start_pool(threads) {
        abort(Fatal::Environment {
            op: "worker pool configuration",
            source,
        });
    }

    tracing::debug!(worker_threads = threads, "event loop running");

    if let Err(source) = event_loop.drive() {
        abort(Fatal::Environment {
            op: "event loop iteration",
            source,
        });
    }

    event_loop.close_handles();

    if let Err(source) = event_loop.drive() {
        abort(Fatal::Environment {
            op: "event loop iteration",
            source,
        });
    }

    if let Err(source) = event_loop.close() {
        abort(Fatal::Environment {
            op: "event loop close",
            source,
        });
    }

    let report = event_loop.finalize();

    tracing::debug!(
        resumed = report.resumed,
        destroyed = report.destroyed,
        abandoned = report.abandoned,
        "event loop shut down"
    );
}
