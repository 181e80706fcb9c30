//! The notification queue (spec §4.5/§6): buffers [`Notification`]s until
//! the host drains them, so an operation completing deep inside a nested
//! call stack never has to reach back into host code directly.

use std::collections::VecDeque;

use xfer_core::notification::Notification;

#[derive(Default)]
pub struct NotificationQueue {
    events: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.events.push_back(notification);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Buffers log lines emitted while a notification handler might itself
/// still be running, so a log call made from deep within an operation
/// never re-enters the host's notification callback (spec §4.5's "log
/// queue deferral"). The engine drains this into
/// [`NotificationQueue::push`] at a well-defined point between
/// operations rather than inline with every `logging::log` call.
#[derive(Default)]
pub struct DeferralBuffer {
    pending: Vec<logging::LogEvent>,
}

impl DeferralBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulls everything queued in the global `logging` crate since the
    /// last call and holds it here instead of forwarding immediately.
    pub fn capture(&mut self) {
        self.pending.extend(logging::drain_events());
    }

    /// Flushes captured log events into `queue` as [`Notification::Log`]
    /// entries, in the order they were logged.
    pub fn flush_into(&mut self, queue: &mut NotificationQueue) {
        for event in self.pending.drain(..) {
            queue.push(Notification::Log {
                level: event.level,
                text: event.text,
            });
        }
    }
}
