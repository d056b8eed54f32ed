//! # Kestrel
//!
//! **Kestrel** is the task-scheduling core of a source-code intelligence
//! server. It runs every request handler as a task on one event loop thread,
//! and pushes blocking work such as file reads and compiler invocations onto a
//! fixed worker pool.
//!
//! The model is deliberately small:
//!
//! - One loop per process, created by [`init`] and driven by [`run`]
//! - Tasks are spawned futures, resumed in FIFO order on the loop thread
//! - Operations ([`time`], [`fs`], [`process`], [`pool`], [`io`]) suspend the
//!   awaiting task and resume it when they complete
//! - [`stop`] closes every loop resource; cancelled tasks get one last resume,
//!   the others are dropped
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kestrel::task;
//! use kestrel::time::sleep;
//! use std::time::Duration;
//!
//! #[kestrel::main]
//! async fn main() {
//!     let index = task::spawn(async {
//!         let source = kestrel::fs::read_to_string("main.cpp").await?;
//!         Ok::<_, kestrel::error::OperationError>(source.lines().count())
//!     });
//!
//!     sleep(Duration::from_millis(10)).await;
//!     println!("{:?}", index.await);
//! }
//! ```

mod reactor;
mod runtime;

pub mod error;
pub mod fs;
pub mod io;
pub mod pool;
pub mod process;
pub mod sync;
pub mod time;

#[doc(hidden)]
pub mod testing;

pub use error::{Elapsed, JoinError, OperationError, RuntimeError};
pub use runtime::builder::{DEFAULT_WORKER_THREADS, RuntimeBuilder, WORKER_THREADS_ENV};
pub use runtime::task;
pub use runtime::yield_now::yield_now;
pub use runtime::{block_on, init, run, stop, try_init};

pub use kestrel_macros::{main, test};
