//! OS readiness polling for the event loop.
//!
//! Only the Linux `epoll` backend exists. The loop owns exactly one poller,
//! whose `eventfd` doubles as the cross-thread wake source for the remote
//! queue and for [`stop`](crate::stop).

pub(crate) mod common;

mod epoll;

pub(crate) use common::{EventFd, Interest};

pub(crate) type Poller = epoll::EpollPoller;
