use mio::Interest;

const READABLE: u8 = 1;
const WRITABLE: u8 = 2;
const READ_CLOSED: u8 = 4;
const WRITE_CLOSED: u8 = 8;

/// Readiness observed on a watched descriptor, handed to its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready(u8);

impl Ready {
    pub fn is_readable(&self) -> bool {
        self.0 & READABLE != 0 || self.is_read_closed()
    }
    pub fn is_writable(&self) -> bool {
        self.0 & WRITABLE != 0 || self.is_write_closed()
    }
    pub fn is_read_closed(&self) -> bool {
        self.0 & READ_CLOSED != 0
    }
    pub fn is_write_closed(&self) -> bool {
        self.0 & WRITE_CLOSED != 0
    }

    /// Does this readiness satisfy a registered interest?
    pub(crate) fn intersects(&self, interest: Interest) -> bool {
        (interest.is_readable() && self.is_readable())
            || (interest.is_writable() && self.is_writable())
    }
}

#[cfg(test)]
impl Ready {
    pub(crate) fn readable() -> Ready {
        Ready(READABLE)
    }
    pub(crate) fn writable() -> Ready {
        Ready(WRITABLE)
    }
    pub(crate) fn closed() -> Ready {
        Ready(READ_CLOSED | WRITE_CLOSED)
    }
}

impl From<&mio::event::Event> for Ready {
    fn from(event: &mio::event::Event) -> Self {
        let mut bits = 0;
        if event.is_readable() {
            bits |= READABLE;
        }
        if event.is_writable() {
            bits |= WRITABLE;
        }
        if event.is_read_closed() {
            bits |= READ_CLOSED;
        }
        if event.is_write_closed() {
            bits |= WRITE_CLOSED;
        }
        Ready(bits)
    }
}
