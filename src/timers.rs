use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

pub(crate) type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Min-ordered queue of scheduled callbacks.
///
/// Ordering is on fire time alone and the heap is not stable: two tasks
/// scheduled for the same instant run in unspecified relative order. The
/// queue never signals anyone; waking a worker that is sleeping on a
/// stale timeout is the reactor's job.
#[derive(Default)]
pub(crate) struct TimerQueue(BinaryHeap<TimerEntry>);

impl TimerQueue {
    /// Insert a task. Fire times in the past are legal and mean
    /// "as soon as a worker is free".
    pub fn insert(&mut self, when: Instant, callback: TimerCallback) {
        self.0.push(TimerEntry { when, callback });
    }

    /// Fire time of the soonest task, if any.
    pub fn next_fire(&self) -> Option<Instant> {
        self.0.peek().map(|entry| entry.when)
    }

    /// How long a worker may sleep from `now` before the soonest task
    /// is due. Zero if it is already overdue.
    pub fn timeout_from(&self, now: Instant) -> Option<Duration> {
        self.next_fire()
            .map(|when| when.saturating_duration_since(now))
    }

    /// Remove and return the soonest callback if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerCallback> {
        if self.next_fire()? <= now {
            self.0.pop().map(|entry| entry.callback)
        } else {
            None
        }
    }

    /// Discard every pending task, reporting how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.0.len();
        self.0.clear();
        dropped
    }
}

struct TimerEntry {
    when: Instant,
    callback: TimerCallback,
}

// BinaryHeap is a max-heap; compare reversed on the fire time to pop the
// soonest task first. The callback takes no part in the ordering.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.when.cmp(&self.when)
    }
}
