#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! The transfer scheduler (spec §4.6): a bounded pool of engine slots,
//! the dispatch algorithm that claims queued items onto them respecting
//! per-server connection caps and reconnect back-off, post-operation
//! routing (retry/remove/fail), the idle-disconnect sweep, and the
//! action-after-queue-completion countdown.
//!
//! This crate decides *what* should run *where*; it does not itself
//! drive bytes on the wire — that is `crates/engine`'s `Engine<E>`,
//! instantiated per protocol by the host once a [`dispatch::Dispatched`]
//! names a slot and queue item to run.

pub mod action_after_queue;
pub mod dispatch;
pub mod engine_pool;
pub mod idle;
pub mod queue;
pub mod scheduler;

pub use action_after_queue::{ActionAfterQueue, QueueCompletionAction};
pub use dispatch::{route_completed, try_start_next_transfer, Dispatched, RoutingDecision};
pub use engine_pool::{EnginePool, EngineSlot, InteractiveSessionId, SlotId};
pub use queue::{QueueItem, TransferQueue};
pub use scheduler::TransferScheduler;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("engine pool is saturated and no slot could be borrowed")]
    PoolSaturated,
    #[error("reconnect attempts exhausted for this server")]
    ReconnectExhausted,
}
