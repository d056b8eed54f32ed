//! Synchronization between tasks on the same loop.
//!
//! Tasks never run in parallel, so these primitives only have to order
//! tasks across suspension points. They are `!Send` and `!Sync`.

mod mutex;

pub use mutex::{Lock, Mutex, MutexGuard};
