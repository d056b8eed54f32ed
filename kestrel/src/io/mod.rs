//! Readiness watching for raw file descriptors.

mod watch;

pub use watch::{Readiness, Watcher};
