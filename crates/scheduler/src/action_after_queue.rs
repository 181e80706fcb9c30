//! "Action after queue completion" (spec §4.6): once the queue empties,
//! the host may be configured to reboot, shut down, or sleep the
//! machine. Before doing so it shows a user-cancellable countdown
//! (default 15s, via `ConfigOracle::action_after_queue_warning`).

use std::time::Duration;

/// The action to take once the queue empties and its warning period has
/// elapsed uncancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCompletionAction {
    None,
    Reboot,
    Shutdown,
    Sleep,
    CloseProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Warning,
    Canceled,
    Ready,
}

/// Tracks the countdown between "queue emptied" and "action fires",
/// allowing the user to cancel at any point before it elapses.
pub struct ActionAfterQueue {
    action: QueueCompletionAction,
    warning: Duration,
    remaining: Duration,
    state: State,
}

impl ActionAfterQueue {
    pub fn new(action: QueueCompletionAction, warning: Duration) -> Self {
        Self {
            action,
            warning,
            remaining: warning,
            state: State::Idle,
        }
    }

    pub fn action(&self) -> QueueCompletionAction {
        self.action
    }

    pub fn set_action(&mut self, action: QueueCompletionAction) {
        self.action = action;
    }

    /// Called when the queue transitions from non-empty to empty.
    pub fn queue_emptied(&mut self) {
        if self.action == QueueCompletionAction::None {
            return;
        }
        self.remaining = self.warning;
        self.state = State::Warning;
    }

    /// Called when a new item is enqueued, aborting any pending action.
    pub fn queue_resumed(&mut self) {
        self.state = State::Idle;
        self.remaining = self.warning;
    }

    /// The user explicitly canceled the pending action.
    pub fn cancel(&mut self) {
        if self.state == State::Warning {
            self.state = State::Canceled;
        }
    }

    pub fn is_warning(&self) -> bool {
        self.state == State::Warning
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Advances the countdown by `elapsed`. Returns `true` exactly once,
    /// the moment the countdown reaches zero uncancelled — the caller
    /// should perform `action()` then.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.state != State::Warning {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.state = State::Ready;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_fires_exactly_once_when_elapsed() {
        let mut action = ActionAfterQueue::new(QueueCompletionAction::Shutdown, Duration::from_secs(15));
        action.queue_emptied();
        assert!(!action.tick(Duration::from_secs(10)));
        assert!(action.tick(Duration::from_secs(10)));
        assert!(!action.tick(Duration::from_secs(10)));
    }

    #[test]
    fn cancel_stops_the_countdown_from_firing() {
        let mut action = ActionAfterQueue::new(QueueCompletionAction::Reboot, Duration::from_secs(15));
        action.queue_emptied();
        action.cancel();
        assert!(!action.tick(Duration::from_secs(30)));
    }

    #[test]
    fn resuming_the_queue_resets_the_countdown() {
        let mut action = ActionAfterQueue::new(QueueCompletionAction::Sleep, Duration::from_secs(15));
        action.queue_emptied();
        action.tick(Duration::from_secs(10));
        action.queue_resumed();
        assert_eq!(action.remaining(), Duration::from_secs(15));
        assert!(!action.is_warning());
    }

    #[test]
    fn action_none_never_enters_warning_state() {
        let mut action = ActionAfterQueue::new(QueueCompletionAction::None, Duration::from_secs(15));
        action.queue_emptied();
        assert!(!action.is_warning());
    }
}
