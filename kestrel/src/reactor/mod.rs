//! Loop-owned resources: handles, timers, readiness watchers and the bridge
//! from the worker pool back onto the loop thread.
//!
//! Nothing here is thread-safe except [`Remote`], which is the single entry
//! point for other threads.

mod core;
mod event;
mod handle;
mod poller;
mod remote;
mod timer;

pub(crate) use self::core::Reactor;
pub(crate) use poller::Interest;
pub(crate) use poller::common::signal;
pub(crate) use remote::{Remote, RemoteEvent, WorkOutcome};

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a handle in the reactor registry.
pub(crate) type HandleId = u64;

/// Identifies an in-flight worker pool request.
pub(crate) type RequestId = u64;

/// Process-wide so that ids are never reused across loop generations.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
