use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use log::{debug, warn};
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};

use crate::ready::Ready;

pub(crate) type WatchCallback = Arc<dyn Fn(Ready) + Send + Sync + 'static>;

/// Registered readiness interests, mirrored into the poller's registry.
///
/// At most one entry exists per exact `(fd, interest)` pair. The same fd may
/// be watched under several distinct interests; the poller registration for
/// the fd always carries the union of them, so the table and the registry
/// stay in lockstep.
#[derive(Default)]
pub(crate) struct WatchTable {
    entries: HashMap<RawFd, Vec<WatchEntry>>,
}

struct WatchEntry {
    interest: Interest,
    callback: WatchCallback,
}

fn token_for(fd: RawFd) -> Token {
    Token(fd as usize)
}

fn union(interests: &[WatchEntry], extra: Interest) -> Interest {
    interests.iter().fold(extra, |acc, entry| acc | entry.interest)
}

impl WatchTable {
    /// Register `callback` for `interest` on `fd`. Fails if the exact pair
    /// is already watched (the original callback stays registered) or if
    /// the poller refuses the descriptor.
    pub fn insert(
        &mut self,
        registry: &Registry,
        fd: RawFd,
        interest: Interest,
        callback: WatchCallback,
    ) -> bool {
        let entries = self.entries.entry(fd).or_default();
        if entries.iter().any(|entry| entry.interest == interest) {
            return false;
        }

        let combined = union(entries, interest);
        let fresh = entries.is_empty();
        let registered = if fresh {
            registry.register(&mut SourceFd(&fd), token_for(fd), combined)
        } else {
            registry.reregister(&mut SourceFd(&fd), token_for(fd), combined)
        };

        match registered {
            Ok(()) => {
                entries.push(WatchEntry { interest, callback });
                true
            }
            Err(err) => {
                warn!("poller registration for fd {fd} failed: {err}");
                if fresh {
                    self.entries.remove(&fd);
                }
                false
            }
        }
    }

    /// Deregister the exact `(fd, interest)` pair. Fails if it is not
    /// currently watched.
    pub fn remove(&mut self, registry: &Registry, fd: RawFd, interest: Interest) -> bool {
        let Some(entries) = self.entries.get_mut(&fd) else {
            return false;
        };
        let Some(position) = entries.iter().position(|entry| entry.interest == interest) else {
            return false;
        };
        entries.remove(position);

        if let Some(first) = entries.first() {
            let remaining = union(&entries[1..], first.interest);
            if registry
                .reregister(&mut SourceFd(&fd), token_for(fd), remaining)
                .is_err()
            {
                // Rebuild the registration rather than leave the poller
                // holding the old, wider interest.
                let _ = registry.deregister(&mut SourceFd(&fd));
                if let Err(err) = registry.register(&mut SourceFd(&fd), token_for(fd), remaining) {
                    warn!("narrowing poller interest for fd {fd} failed: {err}");
                }
            }
        } else {
            self.entries.remove(&fd);
            if let Err(err) = registry.deregister(&mut SourceFd(&fd)) {
                debug!("poller deregistration for fd {fd} failed: {err}");
            }
        }
        true
    }

    /// Callbacks on `fd` whose interest overlaps the observed readiness.
    /// Cloned out so they can be invoked with the shared lock released.
    pub fn matching(&self, fd: RawFd, ready: Ready) -> Vec<WatchCallback> {
        match self.entries.get(&fd) {
            Some(entries) => entries
                .iter()
                .filter(|entry| ready.intersects(entry.interest))
                .map(|entry| Arc::clone(&entry.callback))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Drop every entry, deregistering each fd from the poller. Returns how
    /// many watches were discarded.
    pub fn clear(&mut self, registry: &Registry) -> usize {
        let mut dropped = 0;
        for (fd, entries) in self.entries.drain() {
            dropped += entries.len();
            if let Err(err) = registry.deregister(&mut SourceFd(&fd)) {
                debug!("poller deregistration for fd {fd} failed: {err}");
            }
        }
        dropped
    }
}
