//! A single-threaded event loop and timer wheel (spec §6). The scheduler
//! and engine crates drive this loop directly rather than spawning a
//! reactor thread per session, matching the single-threaded-per-session
//! model spec §4 assumes throughout.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Identifies a registered timer so it can be canceled before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer {
    id: TimerId,
    deadline: Instant,
    /// `Some` for a recurring timer; the interval it re-arms itself with.
    interval: Option<Duration>,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for Timer {}
impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

/// A minimal single-threaded timer wheel. Callers poll [`EventLoop::tick`]
/// with the current time and get back the ids of every timer that has
/// fired since the last call; recurring timers are automatically re-armed.
#[derive(Debug, Default)]
pub struct EventLoop {
    next_id: u64,
    timers: BinaryHeap<Reverse<Timer>>,
    canceled: std::collections::HashSet<TimerId>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            timers: BinaryHeap::new(),
            canceled: std::collections::HashSet::new(),
        }
    }

    fn alloc_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Arms a one-shot timer firing `delay` from `now`.
    pub fn schedule_once(&mut self, now: Instant, delay: Duration) -> TimerId {
        let id = self.alloc_id();
        self.timers.push(Reverse(Timer {
            id,
            deadline: now + delay,
            interval: None,
        }));
        id
    }

    /// Arms a timer that fires every `interval`, first firing `interval`
    /// from `now` (used for the idle-disconnect check and reconnect
    /// back-off polling).
    pub fn schedule_recurring(&mut self, now: Instant, interval: Duration) -> TimerId {
        let id = self.alloc_id();
        self.timers.push(Reverse(Timer {
            id,
            deadline: now + interval,
            interval: Some(interval),
        }));
        id
    }

    /// Cancels a timer. Safe to call with an id that already fired or was
    /// already canceled.
    pub fn cancel(&mut self, id: TimerId) {
        self.canceled.insert(id);
    }

    /// Returns the ids of all timers whose deadline is at or before `now`,
    /// re-arming recurring ones. Canceled timers are silently dropped
    /// rather than reported.
    pub fn tick(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        while let Some(Reverse(timer)) = self.timers.peek() {
            if timer.deadline > now {
                break;
            }
            let Reverse(timer) = self.timers.pop().unwrap();
            if self.canceled.remove(&timer.id) {
                continue;
            }
            fired.push(timer.id);
            if let Some(interval) = timer.interval {
                self.timers.push(Reverse(Timer {
                    id: timer.id,
                    deadline: now + interval,
                    interval: Some(interval),
                }));
            }
        }
        fired
    }

    /// How long until the next timer fires, or `None` if none are armed.
    /// Used by the host to size a `poll`/`select` timeout.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.timers
            .peek()
            .map(|Reverse(t)| t.deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut el = EventLoop::new();
        let start = Instant::now();
        let id = el.schedule_once(start, Duration::from_secs(1));
        assert!(el.tick(start).is_empty());
        let fired = el.tick(start + Duration::from_secs(1));
        assert_eq!(fired, vec![id]);
        assert!(el.tick(start + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn recurring_rearms_itself() {
        let mut el = EventLoop::new();
        let start = Instant::now();
        let id = el.schedule_recurring(start, Duration::from_secs(1));
        assert_eq!(el.tick(start + Duration::from_secs(1)), vec![id]);
        assert_eq!(el.tick(start + Duration::from_secs(2)), vec![id]);
    }

    #[test]
    fn canceled_timer_does_not_fire() {
        let mut el = EventLoop::new();
        let start = Instant::now();
        let id = el.schedule_once(start, Duration::from_secs(1));
        el.cancel(id);
        assert!(el.tick(start + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn next_deadline_reports_time_remaining() {
        let mut el = EventLoop::new();
        let start = Instant::now();
        el.schedule_once(start, Duration::from_secs(5));
        assert_eq!(el.next_deadline(start), Some(Duration::from_secs(5)));
        assert_eq!(el.next_deadline(start), Some(Duration::from_secs(5)));
    }
}
