#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Per-session engine facade: reconnect back-off, the notification
//! queue, log deferral, active-direction bits, and async-request
//! bookkeeping, layered over `crates/session`'s operation stack.

pub mod async_requests;
pub mod backoff;
pub mod facade;
pub mod notification_queue;

pub use facade::{ActiveDirections, CommandOutcome, Engine};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no command is currently in flight")]
    NoCommandInFlight,
    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,
}
