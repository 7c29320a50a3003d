use std::collections::HashSet;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use log::{error, warn};
use mio::{Events, Interest, Poll, Registry};
use parking_lot::{Mutex, MutexGuard};

use crate::ready::Ready;
use crate::timers::TimerQueue;
use crate::wake::{WakeSignal, WAKE_TOKEN};
use crate::watchers::WatchTable;

/// Upper bound on readiness events taken from one wait call.
const EVENT_BATCH: usize = 32;

/// How long an idle worker sleeps before re-checking shared state. Bounds
/// the window in which a lost wake-up could otherwise park a worker forever.
const IDLE_WAIT: Duration = Duration::from_secs(10);

/// A shared I/O and timer reactor driven by a pool of worker threads.
///
/// All shared state sits behind one mutex; workers release it only while
/// blocked in the poller and around every callback invocation, so callbacks
/// may re-enter the reactor freely. [`start`](Reactor::start) and
/// [`stop`](Reactor::stop) refuse to run on a worker thread, which is what
/// keeps a worker from trying to join itself.
///
/// Worker threads hold a reference to the reactor, so the handle must be
/// [`stop`](Reactor::stop)ped for the reactor to be dropped at all.
pub struct Reactor {
    shared: Mutex<Shared>,
    // Whichever worker holds this is the one blocked in the OS wait; the
    // rest queue behind the mutex and re-derive their timeout once inside.
    poller: Mutex<Poll>,
    registry: Registry,
    wake: WakeSignal,
}

struct Shared {
    running: bool,
    timers: TimerQueue,
    watches: WatchTable,
    workers: Vec<JoinHandle<()>>,
    worker_ids: HashSet<ThreadId>,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        let poller = Poll::new()?;
        let registry = poller.registry().try_clone()?;
        let wake = WakeSignal::new(&registry)?;
        Ok(Self {
            shared: Mutex::new(Shared {
                running: false,
                timers: TimerQueue::default(),
                watches: WatchTable::default(),
                workers: Vec::new(),
                worker_ids: HashSet::new(),
            }),
            poller: Mutex::new(poller),
            registry,
            wake,
        })
    }

    /// The clock scheduling is measured against.
    pub fn now() -> Instant {
        Instant::now()
    }

    /// Spawn `threads` more workers. Returns false (and spawns nothing) when
    /// called from one of the reactor's own workers.
    ///
    /// Calling this on an already running reactor grows the pool. Do not
    /// race it against [`stop`](Reactor::stop) from another thread.
    pub fn start(self: &Arc<Self>, threads: usize) -> bool {
        let mut shared = self.shared.lock();
        if shared.worker_ids.contains(&thread::current().id()) {
            return false;
        }

        shared.running = true;
        for _ in 0..threads {
            let reactor = Arc::clone(self);
            let handle = thread::spawn(move || reactor.worker_loop());
            shared.worker_ids.insert(handle.thread().id());
            shared.workers.push(handle);
        }
        true
    }

    /// Halt the reactor: discard pending timers and watches, wake and join
    /// every worker. Returns false when called from one of the reactor's own
    /// workers, which would otherwise join itself.
    ///
    /// Pending work is dropped without notifying its owners; unwatch any
    /// descriptor whose callback still matters before stopping. Idempotent
    /// once stopped.
    pub fn stop(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.worker_ids.contains(&thread::current().id()) {
            return false;
        }
        shared.running = false;

        let watches = shared.watches.clear(&self.registry);
        if watches > 0 {
            warn!("stopping reactor with {watches} descriptors still watched; consider unwatching them first");
        }
        let tasks = shared.timers.clear();
        if tasks > 0 {
            warn!("stopping reactor with {tasks} pending timer tasks");
        }

        let workers = mem::take(&mut shared.workers);
        drop(shared);

        // One wake frees the worker blocked in the poller; each exiting
        // worker re-raises it so the rest follow.
        self.wake.raise();
        for handle in workers {
            let id = handle.thread().id();
            if handle.join().is_err() {
                error!("reactor worker panicked");
            }
            self.shared.lock().worker_ids.remove(&id);
        }
        true
    }

    /// Schedule `callback` to run at `when`. Fire-and-forget: there is no
    /// cancellation short of [`stop`](Reactor::stop). Times in the past mean
    /// "as soon as a worker is free".
    pub fn schedule_at(&self, when: Instant, callback: impl FnOnce() + Send + 'static) {
        let mut shared = self.shared.lock();
        let previous_min = shared.timers.next_fire();
        shared.timers.insert(when, Box::new(callback));
        // A parked worker computed its timeout from the old minimum; wake it
        // so it re-evaluates.
        if shared.timers.next_fire() != previous_min {
            self.wake.raise();
        }
    }

    /// Schedule `callback` to run `delay` from now.
    pub fn schedule_in(&self, delay: Duration, callback: impl FnOnce() + Send + 'static) {
        self.schedule_at(Self::now() + delay, callback);
    }

    /// Register `callback` for readiness of `interest` on `fd`. Returns
    /// false if the exact `(fd, interest)` pair is already watched; watching
    /// the same fd under a different interest is a distinct registration.
    ///
    /// The callback runs on whichever worker observes the readiness, with
    /// the observed state as its argument. Registration is edge-triggered:
    /// consume the descriptor until `WouldBlock`.
    pub fn watch(
        &self,
        fd: RawFd,
        interest: Interest,
        callback: impl Fn(Ready) + Send + Sync + 'static,
    ) -> bool {
        let mut shared = self.shared.lock();
        if !shared
            .watches
            .insert(&self.registry, fd, interest, Arc::new(callback))
        {
            return false;
        }
        // A parked worker is not yet waiting on this descriptor.
        self.wake.raise();
        true
    }

    /// Deregister the exact `(fd, interest)` pair. Returns false if it is
    /// not currently watched. A callback already cloned out for dispatch may
    /// still run once after this returns.
    pub fn unwatch(&self, fd: RawFd, interest: Interest) -> bool {
        self.shared.lock().watches.remove(&self.registry, fd, interest)
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.shared.lock().workers.len()
    }

    fn worker_loop(self: Arc<Self>) {
        let mut events = Events::with_capacity(EVENT_BATCH);

        loop {
            let wait = {
                let mut poller = self.poller.lock();
                let timeout = {
                    let shared = self.shared.lock();
                    if !shared.running {
                        break;
                    }
                    shared
                        .timers
                        .timeout_from(Instant::now())
                        .unwrap_or(IDLE_WAIT)
                };
                poller.poll(&mut events, Some(timeout))
            };

            match wait {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("reactor wait failed: {err}");
                    continue;
                }
            }

            let mut shared = self.shared.lock();

            for event in events.iter() {
                if event.token() == WAKE_TOKEN {
                    // Coalesced wake-up; mio drained it already.
                    continue;
                }
                let ready = Ready::from(event);
                let fd = event.token().0 as RawFd;
                for callback in shared.watches.matching(fd, ready) {
                    MutexGuard::unlocked(&mut shared, || callback(ready));
                }
            }

            // Fresh clock reading per task: a callback may take long enough
            // to make the next one due as well.
            while let Some(task) = shared.timers.pop_due(Instant::now()) {
                MutexGuard::unlocked(&mut shared, task);
            }
        }

        // Nudge a sibling so it re-checks the running flag promptly.
        self.wake.raise();
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
