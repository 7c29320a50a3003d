#![forbid(unsafe_code)]

//! A thread-pooled I/O and timer reactor.
//!
//! One shared [`Reactor`] drives any number of worker threads. Each worker
//! waits on the same poller for readiness of watched file descriptors or for
//! the next scheduled callback to come due, and every event or due task is
//! dispatched to exactly one thread. Callbacks run with the reactor's
//! internal lock released, so they may freely call back into the reactor
//! (schedule more work, watch or unwatch descriptors).
//!
//! This crate is Unix-only: descriptors are registered by raw fd through
//! `mio::unix::SourceFd`. mio registers edge-triggered, so a readiness
//! callback must consume the descriptor until `WouldBlock` or it will not
//! fire again for that state.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let reactor = Arc::new(evmux::Reactor::new().unwrap());
//! reactor.start(2);
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! reactor.schedule_in(Duration::from_millis(10), move || {
//!     tx.send(()).unwrap();
//! });
//! rx.recv_timeout(Duration::from_secs(5)).unwrap();
//!
//! reactor.stop();
//! ```

mod reactor;
mod ready;
mod timers;
mod wake;
mod watchers;

pub use reactor::Reactor;
pub use ready::Ready;

pub use mio::Interest;
