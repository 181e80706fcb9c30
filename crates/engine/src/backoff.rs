//! Reconnect back-off policy (spec §4.5).

use std::time::{Duration, Instant};

use xfer_core::options::ConfigOracle;

/// Tracks reconnect attempts for a single session and decides when the
/// next attempt is due, consulting the configured back-off schedule.
/// Resets to attempt zero on any successful connection.
pub struct ReconnectPolicy {
    attempt: u32,
    next_attempt_at: Option<Instant>,
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            next_attempt_at: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Call after a connection attempt fails; schedules the next retry
    /// and returns `false` once the configured attempt ceiling is
    /// exceeded (the caller should then surface `CRITICALERROR`).
    pub fn record_failure(&mut self, config: &dyn ConfigOracle, now: Instant) -> bool {
        if self.attempt >= config.max_reconnect_attempts() {
            return false;
        }
        let wait = config.reconnect_backoff(self.attempt);
        self.next_attempt_at = Some(now + wait);
        self.attempt += 1;
        true
    }

    pub fn record_success(&mut self) {
        self.attempt = 0;
        self.next_attempt_at = None;
    }

    /// Whether a reconnect attempt is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.next_attempt_at {
            Some(at) => now >= at,
            None => true,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}
