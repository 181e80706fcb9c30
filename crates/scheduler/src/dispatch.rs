//! The dispatch algorithm (spec §4.6): pulls queued items onto engine
//! slots respecting the bounded pool, per-server connection caps, and
//! reconnect back-off, then routes completed operations back into the
//! queue (retry, remove, or fail the whole branch).

use std::time::Instant;

use xfer_core::command::TransferDirection;
use xfer_core::options::ConfigOracle;
use xfer_core::reply::ReplyCode;
use xfer_core::server::Server;

use engine::backoff::ReconnectPolicy;

use crate::engine_pool::{EnginePool, SlotId};
use crate::queue::{QueueItem, TransferQueue};

/// One unit of dispatch work: a queue item bound to the slot it should
/// run on.
pub struct Dispatched {
    pub slot: SlotId,
    pub item: QueueItem,
}

/// What should happen to a queue item once its command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// The command succeeded; drop it from the queue.
    Remove,
    /// A transient failure; requeue it at the front of its server's
    /// queue to retry once the back-off allows another attempt.
    RetryAtFront,
    /// A non-retryable failure; drop it and let the caller surface the
    /// error to the user (spec §4.6, "failed branch removal").
    FailBranch,
}

/// Attempts to start as many queued transfers as the pool and each
/// server's connection cap and reconnect back-off allow. Returns one
/// `Dispatched` per slot successfully claimed.
pub fn try_start_next_transfer(
    queue: &mut TransferQueue,
    pool: &mut EnginePool,
    reconnects: &mut impl FnMut(&Server) -> &mut ReconnectPolicy,
    config: &dyn ConfigOracle,
    now: Instant,
) -> Vec<Dispatched> {
    let mut dispatched = Vec::new();
    let max_connections_for = |server: &Server| -> usize {
        if server.max_connections > 0 {
            server.max_connections as usize
        } else {
            config.default_max_connections_per_server()
        }
    };

    // A server can fail to yield a slot (connection cap reached with no
    // idle/borrowable slot, or its next item's direction is at its
    // concurrent_download_limit/concurrent_upload_limit) without the
    // whole round stopping — other ready servers may still have
    // capacity. `exhausted` tracks servers already tried and failed this
    // round so `next_ready_server`'s round-robin doesn't spin on them
    // forever.
    let mut exhausted = Vec::new();
    loop {
        let candidate = queue.next_ready_server(|server| !exhausted.contains(server) && reconnects(server).is_due(now));
        let Some(server) = candidate else { break };

        let Some(direction) = queue.peek_for_server(&server).and_then(|item| item.direction()) else {
            // Not a file transfer (or the server's queue emptied out
            // from under us); dispatch it without direction gating.
            let max_connections = max_connections_for(&server);
            let Some(slot) = pool.acquire_for_transfer(&server, max_connections, None) else {
                exhausted.push(server);
                continue;
            };
            let Some(item) = queue.pop_for_server(&server) else {
                pool.release_after_transfer(slot, now);
                exhausted.push(server);
                continue;
            };
            dispatched.push(Dispatched { slot, item });
            continue;
        };

        let limit = match direction {
            TransferDirection::Download => config.concurrent_download_limit(),
            TransferDirection::Upload => config.concurrent_upload_limit(),
        };
        if let Some(limit) = limit {
            if pool.count_active_direction(direction) >= limit as usize {
                exhausted.push(server);
                continue;
            }
        }

        let max_connections = max_connections_for(&server);
        let Some(slot) = pool.acquire_for_transfer(&server, max_connections, Some(direction)) else {
            exhausted.push(server);
            continue;
        };
        let Some(item) = queue.pop_for_server(&server) else {
            pool.release_after_transfer(slot, now);
            exhausted.push(server);
            continue;
        };
        dispatched.push(Dispatched { slot, item });
    }

    dispatched
}

/// Decides what to do with a finished item based on its reply code and
/// how many times it has already been retried.
pub fn route_completed(item: &QueueItem, reply: ReplyCode, max_retries: u32) -> RoutingDecision {
    if reply.is_success() {
        return RoutingDecision::Remove;
    }
    if reply.is_retryable() && item.retry_count < max_retries {
        return RoutingDecision::RetryAtFront;
    }
    RoutingDecision::FailBranch
}
