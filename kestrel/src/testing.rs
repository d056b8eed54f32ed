//! Support for tests that create the process-wide event loop.
//!
//! Only one loop may exist at a time, while the test harness runs tests on
//! parallel threads. Every test that creates a loop holds [`serial`] for its
//! whole duration; `#[kestrel::test]` does this automatically.

use std::sync::{Mutex, MutexGuard, PoisonError};

static SERIAL: Mutex<()> = Mutex::new(());

/// Blocks until no other loop-creating test is running.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}
