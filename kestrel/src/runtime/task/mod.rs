//! Tasks: spawned futures driven by the event loop.
//!
//! A task is polled only on the loop thread, from the ready queue, one at a
//! time. It runs until it awaits something not yet available, then sits
//! suspended until the operation wakes it. Its [`JoinHandle`] yields the
//! output, or [`JoinError::Destroyed`](crate::error::JoinError::Destroyed) if
//! shutdown dropped the task first.
//!
//! Cancellation is cooperative: [`JoinHandle::cancel`] raises a flag the task
//! reads through [`cancelled`].

mod core;
mod gather;
mod handle;
mod state;
mod waker;

pub(crate) use self::core::Resumable;

pub use self::core::{TaskId, cancelled, id, spawn};
pub use gather::gather;
pub use handle::JoinHandle;
