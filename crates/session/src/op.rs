//! The operation stack (spec §4.4), generalizing upstream's
//! `COpData`/`CFtpControlSocket::m_pCurOpData` singly linked chain of
//! operation-data objects into an owned `Vec` of trait objects.
//!
//! # Design
//!
//! Upstream represents "an operation in progress, possibly waiting on a
//! nested sub-operation" with a linked list of polymorphic `COpData`
//! pointers and an integer `opId`/`state` pair, downcast with `static_cast`
//! at the call site that knows which concrete type is on top. That
//! downcasting has no equivalent here: each protocol module defines its
//! own `Operation` implementors and the stack is generic over the event
//! type the protocol's session delivers (an FTP reply, or a line-framed
//! subprocess message), so the compiler — not a runtime tag — guarantees
//! `on_event` is only ever called with an event of the right shape.

use logging::Level;

/// What an [`Operation`] wants to happen next after being stepped.
pub enum StepOutcome<E> {
    /// The operation is not finished; nothing needs to be sent right now
    /// (e.g. waiting on an async request the host hasn't answered yet).
    Pending,
    /// Send this line to the server/subprocess and wait for the next
    /// event before stepping again.
    Send(String),
    /// Push a child operation onto the stack; when it completes, this
    /// operation's `on_child_complete` is called with its result.
    PushChild(Box<dyn Operation<Event = E>>),
    /// The operation is finished; pop it from the stack and report this
    /// result to whatever pushed it (the session, or a parent operation).
    Complete(xfer_core::reply::ReplyCode),
    /// The operation needs host input before it can continue; raise it to
    /// the host and wait for `on_async_answer` rather than another event.
    AsyncRequest(xfer_core::notification::AsyncRequest),
}

/// One step in a protocol operation's state machine. `E` is the event
/// type the owning session delivers — an FTP reply or a line-framed
/// subprocess message, never both, so a concrete operation only ever
/// implements one of `session::ftp`'s or `session::sftp`'s operation
/// traits in practice.
pub trait Operation {
    type Event;

    /// A short, stable name for logging.
    fn name(&self) -> &'static str;

    /// The operation's current state, for diagnostics; upstream's
    /// integer `opState` has no single successor here since each
    /// operation enumerates its own states, but exposing *some* ordinal
    /// keeps parity with upstream's debug logging, which always prints
    /// `opState`.
    fn state(&self) -> u32;

    /// Called once when the operation is first pushed.
    fn start(&mut self) -> StepOutcome<Self::Event>;

    /// Called with each event while this operation is on top of the
    /// stack.
    fn on_event(&mut self, event: &Self::Event) -> StepOutcome<Self::Event>;

    /// Called when a child this operation pushed has completed.
    fn on_child_complete(
        &mut self,
        reply: xfer_core::reply::ReplyCode,
    ) -> StepOutcome<Self::Event>;

    /// Called when the host answers an async request this operation
    /// raised via [`StepOutcome::AsyncRequest`]. The default implementation
    /// fails the operation outright, since most operations never raise one;
    /// only the handful that do (e.g. `ftp::transfer`'s overwrite check)
    /// need to override it.
    fn on_async_answer(
        &mut self,
        _answer: xfer_core::command::ExistsAction,
    ) -> StepOutcome<Self::Event> {
        StepOutcome::Complete(xfer_core::reply::ReplyCode::ERROR | xfer_core::reply::ReplyCode::INTERNALERROR)
    }
}

/// A LIFO stack of in-flight operations. The top of the stack is the one
/// currently receiving events; everything below it is suspended waiting
/// for its immediate child to complete.
pub struct OperationStack<E> {
    frames: Vec<Box<dyn Operation<Event = E>>>,
}

impl<E> Default for OperationStack<E> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<E> OperationStack<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top_name(&self) -> Option<&'static str> {
        self.frames.last().map(|op| op.name())
    }

    /// Pushes the root operation for a freshly issued command, running
    /// its `start()` immediately and applying the outcome.
    pub fn push_root(&mut self, mut op: Box<dyn Operation<Event = E>>) -> Drive<E> {
        logging::log(Level::DebugVerbose, format!("pushing root operation {}", op.name()));
        let outcome = op.start();
        self.frames.push(op);
        self.apply(outcome)
    }

    fn apply(&mut self, outcome: StepOutcome<E>) -> Drive<E> {
        match outcome {
            StepOutcome::Pending => Drive::Idle,
            StepOutcome::Send(line) => Drive::Send(line),
            StepOutcome::PushChild(mut child) => {
                logging::log(Level::DebugVerbose, format!("pushing child operation {}", child.name()));
                let child_outcome = child.start();
                self.frames.push(child);
                self.apply(child_outcome)
            }
            StepOutcome::Complete(reply) => self.pop_and_propagate(reply),
            StepOutcome::AsyncRequest(request) => Drive::AsyncRequest(request),
        }
    }

    fn pop_and_propagate(&mut self, reply: xfer_core::reply::ReplyCode) -> Drive<E> {
        if let Some(done) = self.frames.pop() {
            logging::log(
                Level::DebugVerbose,
                format!("operation {} completed (state {})", done.name(), done.state()),
            );
        }
        match self.frames.last_mut() {
            Some(parent) => {
                let outcome = parent.on_child_complete(reply);
                self.apply(outcome)
            }
            None => Drive::StackComplete(reply),
        }
    }

    /// Delivers `event` to the top of the stack and drives any resulting
    /// cascade of completions/pushes to a stable point: either waiting
    /// for more input (`Idle`/`Send`), or the whole stack draining to
    /// empty (`StackComplete`). Errors if nothing is on the stack: an
    /// event with no operation to receive it means the caller lost track
    /// of session state.
    pub fn on_event(&mut self, event: &E) -> Result<Drive<E>, crate::SessionError> {
        let Some(top) = self.frames.last_mut() else {
            return Err(crate::SessionError::EmptyStack);
        };
        let outcome = top.on_event(event);
        Ok(self.apply(outcome))
    }

    /// Delivers the host's answer to an outstanding async request to the
    /// top of the stack (the operation that raised it) and drives the
    /// resulting outcome the same way [`OperationStack::on_event`] does.
    pub fn on_async_answer(
        &mut self,
        answer: xfer_core::command::ExistsAction,
    ) -> Result<Drive<E>, crate::SessionError> {
        let Some(top) = self.frames.last_mut() else {
            return Err(crate::SessionError::EmptyStack);
        };
        let outcome = top.on_async_answer(answer);
        Ok(self.apply(outcome))
    }
}

/// The externally visible result of driving the stack one step.
pub enum Drive<E> {
    /// Nothing to send; still waiting on something (an async request, a
    /// timer) before the top operation can continue.
    Idle,
    /// Send this line and wait for the next event.
    Send(String),
    /// The entire stack drained: the root operation (and everything it
    /// pushed) is finished with this result.
    StackComplete(xfer_core::reply::ReplyCode),
    /// The top of the stack needs host input; raise `request` to the host
    /// and wait for an answer via [`OperationStack::on_async_answer`].
    AsyncRequest(xfer_core::notification::AsyncRequest),
}
