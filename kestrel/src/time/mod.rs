//! Timers driven by the event loop.
//!
//! Deadlines are measured from the loop's cached time, refreshed once per
//! iteration, so timers started in the same iteration share a base.

mod sleep;
mod timeout;

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Timeout, timeout};
