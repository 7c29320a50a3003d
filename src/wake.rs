use std::io;

use log::warn;
use mio::{Registry, Token, Waker};

/// Token reserved for the reactor's wake-up channel. Descriptor tokens are
/// derived from raw fds and can never collide with it.
pub(crate) const WAKE_TOKEN: Token = Token(usize::MAX);

/// Cross-thread wake-up for a worker parked in the poller.
///
/// Wakes coalesce: any number of signals raised before a worker observes
/// the event collapse into a single wake-up, and none are lost. mio drains
/// the underlying descriptor itself, so observing the event is all the
/// bookkeeping a worker has to do.
pub(crate) struct WakeSignal(Waker);

impl WakeSignal {
    pub fn new(registry: &Registry) -> io::Result<Self> {
        Ok(Self(Waker::new(registry, WAKE_TOKEN)?))
    }

    /// Interrupt a parked worker. Never blocks the caller; a failed wake
    /// is logged and otherwise ignored.
    pub fn raise(&self) {
        if let Err(err) = self.0.wake() {
            warn!("reactor wake-up failed: {err}");
        }
    }
}
