//! The per-session engine facade (spec §4.5): wraps one protocol's
//! operation stack with reconnect back-off, the notification queue, log
//! deferral, active-direction bits, and async-request bookkeeping, so
//! `crates/scheduler` deals with a uniform interface regardless of which
//! concrete protocol a session speaks.

use std::time::Instant;

use xfer_core::command::{CommandId, ExistsAction};
use xfer_core::notification::{Notification, RequestId};
use xfer_core::options::ConfigOracle;
use xfer_core::reply::ReplyCode;

use session::op::{Drive, Operation, OperationStack};

use crate::async_requests::AsyncRequestTracker;
use crate::backoff::ReconnectPolicy;
use crate::notification_queue::{DeferralBuffer, NotificationQueue};
use crate::EngineError;

bitflags::bitflags! {
    /// Which transfer directions this engine currently has an active
    /// data connection for; consulted by the scheduler when deciding
    /// whether an idle engine is safe to disconnect or hand to another
    /// session (spec §4.5, "active-direction signalling").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActiveDirections: u8 {
        const DOWNLOAD = 1 << 0;
        const UPLOAD = 1 << 1;
    }
}

/// Drives one session's operation stack and owns everything the
/// scheduler needs to know about that session beyond the bytes on the
/// wire.
pub struct Engine<E> {
    stack: OperationStack<E>,
    current_command: Option<CommandId>,
    reconnect: ReconnectPolicy,
    notifications: NotificationQueue,
    deferral: DeferralBuffer,
    async_requests: AsyncRequestTracker,
    active_directions: ActiveDirections,
    connected: bool,
}

impl<E> Default for Engine<E> {
    fn default() -> Self {
        Self {
            stack: OperationStack::new(),
            current_command: None,
            reconnect: ReconnectPolicy::new(),
            notifications: NotificationQueue::new(),
            deferral: DeferralBuffer::new(),
            async_requests: AsyncRequestTracker::new(),
            active_directions: ActiveDirections::empty(),
            connected: false,
        }
    }
}

impl<E> Engine<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_busy(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn active_directions(&self) -> ActiveDirections {
        self.active_directions
    }

    pub fn set_active_direction(&mut self, direction: ActiveDirections, active: bool) {
        self.active_directions.set(direction, active);
    }

    pub fn reconnect_policy_mut(&mut self) -> &mut ReconnectPolicy {
        &mut self.reconnect
    }

    pub fn async_requests_mut(&mut self) -> &mut AsyncRequestTracker {
        &mut self.async_requests
    }

    /// Starts a fresh command, pushing its root operation. `command_id`
    /// correlates the eventual `OperationComplete` notification back to
    /// the caller's own bookkeeping.
    pub fn start_command(&mut self, command_id: CommandId, op: Box<dyn Operation<Event = E>>) -> CommandOutcome {
        self.current_command = Some(command_id);
        self.drive(self.stack.push_root(op))
    }

    /// Feeds `event` to the in-flight command's operation stack. Errors
    /// if no command is in flight: a stray reply with nothing on the
    /// stack to receive it indicates the caller lost track of session
    /// state, not a condition to silently swallow.
    pub fn deliver_event(&mut self, event: &E) -> Result<CommandOutcome, EngineError> {
        if self.current_command.is_none() && self.stack.is_empty() {
            return Err(EngineError::NoCommandInFlight);
        }
        let drive = self.stack.on_event(event).map_err(|_| EngineError::NoCommandInFlight)?;
        Ok(self.drive(drive))
    }

    /// Answers an outstanding async request the operation stack raised,
    /// driving the resulting outcome the same way [`Engine::deliver_event`]
    /// does. Errors if `id` isn't (or is no longer) outstanding, matching
    /// `deliver_event`'s treatment of a stray event with nothing to
    /// receive it.
    pub fn answer_async_request(&mut self, id: RequestId, answer: ExistsAction) -> Result<CommandOutcome, EngineError> {
        if self.async_requests.take_answer(id).is_none() {
            return Err(EngineError::NoCommandInFlight);
        }
        let drive = self.stack.on_async_answer(answer).map_err(|_| EngineError::NoCommandInFlight)?;
        Ok(self.drive(drive))
    }

    /// Records a failed reconnect attempt, returning
    /// [`EngineError::ReconnectExhausted`] once the configured attempt
    /// ceiling is passed instead of leaving the caller to inspect the
    /// policy's own bookkeeping.
    pub fn note_reconnect_failure(&mut self, config: &dyn ConfigOracle, now: Instant) -> Result<(), EngineError> {
        if self.reconnect.record_failure(config, now) {
            Ok(())
        } else {
            Err(EngineError::ReconnectExhausted)
        }
    }

    fn drive(&mut self, result: Drive<E>) -> CommandOutcome {
        match result {
            Drive::Idle => CommandOutcome::Waiting,
            Drive::Send(line) => CommandOutcome::Send(line),
            Drive::StackComplete(reply) => {
                if reply.is_disconnected() {
                    self.connected = false;
                }
                if let Some(command_id) = self.current_command.take() {
                    self.notifications.push(Notification::OperationComplete {
                        command: command_id,
                        reply,
                    });
                }
                CommandOutcome::Complete(reply)
            }
            Drive::AsyncRequest(request) => {
                let id = self.async_requests.raise(request.clone());
                self.notifications.push(Notification::AsyncRequestRaised { request_id: id, request });
                CommandOutcome::AsyncRequest(id)
            }
        }
    }

    pub fn mark_connected(&mut self, now: Instant) {
        self.connected = true;
        self.reconnect.record_success();
        self.notifications.push(Notification::ConnectionStateChanged { connected: true });
        let _ = now;
    }

    /// Drains pending log events into the notification queue and then
    /// drains the whole notification queue, the well-defined flush point
    /// between operations spec §4.5 calls for.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.deferral.capture();
        self.deferral.flush_into(&mut self.notifications);
        self.notifications.drain()
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }
}

/// The result of feeding the engine a command or event.
#[derive(Debug)]
pub enum CommandOutcome {
    /// Nothing to send right now.
    Waiting,
    /// Send this line over the wire.
    Send(String),
    /// The whole command finished with this reply.
    Complete(ReplyCode),
    /// The command needs host input before it can continue; answer it via
    /// [`Engine::answer_async_request`].
    AsyncRequest(RequestId),
}
