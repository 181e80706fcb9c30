//! `TransferScheduler`: the top-level object `crates/cli` drives. Owns
//! the queue, the engine pool, per-server reconnect policies, the idle
//! sweep, and the action-after-queue-completion countdown.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use xfer_core::options::ConfigOracle;
use xfer_core::reply::ReplyCode;
use xfer_core::server::Server;

use engine::backoff::ReconnectPolicy;
use logging::Level;

use crate::action_after_queue::{ActionAfterQueue, QueueCompletionAction};
use crate::dispatch::{route_completed, try_start_next_transfer, Dispatched, RoutingDecision};
use crate::engine_pool::{EnginePool, SlotId};
use crate::idle::sweep_idle;
use crate::queue::{QueueItem, TransferQueue};
use crate::SchedulerError;

pub struct TransferScheduler {
    queue: TransferQueue,
    pool: EnginePool,
    reconnects: HashMap<Server, ReconnectPolicy>,
    action_after_queue: ActionAfterQueue,
}

impl TransferScheduler {
    pub fn new(config: &dyn ConfigOracle) -> Self {
        Self {
            queue: TransferQueue::new(),
            pool: EnginePool::new(config.max_simultaneous_transfers() as usize),
            reconnects: HashMap::new(),
            action_after_queue: ActionAfterQueue::new(QueueCompletionAction::None, config.action_after_queue_warning()),
        }
    }

    pub fn set_action_after_queue(&mut self, action: QueueCompletionAction) {
        self.action_after_queue.set_action(action);
    }

    pub fn action_after_queue(&self) -> &ActionAfterQueue {
        &self.action_after_queue
    }

    pub fn enqueue(&mut self, item: QueueItem) {
        self.action_after_queue.queue_resumed();
        self.queue.enqueue(item);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Runs one dispatch round, claiming as many queued items onto idle
    /// or fresh slots as the pool and reconnect back-off allow.
    pub fn dispatch(&mut self, config: &dyn ConfigOracle, now: Instant) -> Vec<Dispatched> {
        let reconnects = &mut self.reconnects;
        let mut lookup = |server: &Server| reconnects.entry(server.clone()).or_default();
        let dispatched = try_start_next_transfer(&mut self.queue, &mut self.pool, &mut lookup, config, now);
        if !dispatched.is_empty() {
            logging::log(
                Level::DebugInfo,
                format!("dispatch round claimed {} slot(s)", dispatched.len()),
            );
        }
        if self.queue.is_empty() && dispatched.is_empty() {
            self.action_after_queue.queue_emptied();
        }
        dispatched
    }

    /// Routes a completed command's result: success drops it and resets
    /// its server's reconnect back-off, a retryable failure requeues it
    /// at the front of its server's queue, and a hard failure drops it
    /// and reports [`RoutingDecision::FailBranch`] so the caller can
    /// surface the error. Also records the reply's disconnect/success
    /// bit against the server's [`ReconnectPolicy`], returning
    /// [`SchedulerError::ReconnectExhausted`] once that server's back-off
    /// schedule runs out — `dispatch` will then simply never consider
    /// that server ready again until the policy is reset.
    pub fn complete(
        &mut self,
        slot: SlotId,
        item: QueueItem,
        reply: ReplyCode,
        max_retries: u32,
        config: &dyn ConfigOracle,
        now: Instant,
    ) -> Result<RoutingDecision, SchedulerError> {
        self.pool.release_after_transfer(slot, now);
        let decision = route_completed(&item, reply, max_retries);
        let policy = self.reconnects.entry(item.server.clone()).or_default();
        let mut exhausted = false;
        if reply.is_disconnected() {
            exhausted = !policy.record_failure(config, now);
        } else if reply.is_success() {
            policy.record_success();
        }
        match decision {
            RoutingDecision::RetryAtFront => {
                let mut retried = item;
                retried.retry_count += 1;
                logging::log(
                    Level::DebugWarning,
                    format!("command {:?} retrying (attempt {})", retried.id, retried.retry_count),
                );
                self.queue.requeue_front(retried);
            }
            RoutingDecision::FailBranch => {
                logging::log(Level::Error, format!("command {:?} failed permanently", item.id));
            }
            RoutingDecision::Remove => {}
        }
        if self.queue.is_empty() {
            self.action_after_queue.queue_emptied();
        }
        if exhausted {
            return Err(SchedulerError::ReconnectExhausted);
        }
        Ok(decision)
    }

    /// Disconnects slots idle past `ConfigOracle::idle_disconnect_timeout`.
    pub fn sweep_idle(&mut self, config: &dyn ConfigOracle, now: Instant) -> Vec<SlotId> {
        let swept = sweep_idle(&mut self.pool, now, config.idle_disconnect_timeout());
        if !swept.is_empty() {
            logging::log(Level::DebugInfo, format!("idle-disconnected {} slot(s)", swept.len()));
        }
        swept
    }

    /// Advances the action-after-queue-completion countdown, returning
    /// `true` exactly once when it fires uncancelled.
    pub fn tick_action_after_queue(&mut self, elapsed: Duration) -> bool {
        let fired = self.action_after_queue.tick(elapsed);
        if fired {
            logging::log(
                Level::Status,
                format!("queue completed, running {:?}", self.action_after_queue.action()),
            );
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::command::{Command, CommandId};
    use xfer_core::options::StaticConfig;
    use xfer_core::server::{Encoding, LogonType, Protocol};

    fn server() -> Server {
        Server {
            protocol: Protocol::Ftp,
            host: "a".into(),
            port: 21,
            user: "u".into(),
            logon_type: LogonType::Normal,
            encoding: Encoding::Auto,
            timezone_offset_minutes: None,
            max_connections: 1,
            post_login_commands: vec![],
            bypass_proxy: false,
            name: None,
        }
    }

    #[test]
    fn dispatch_then_complete_round_trips_an_item() {
        let config = StaticConfig::default();
        let mut scheduler = TransferScheduler::new(&config);
        scheduler.enqueue(QueueItem {
            id: CommandId(1),
            server: server(),
            command: Command::Raw("NOOP".into()),
            retry_count: 0,
            priority: 0,
        });
        let now = Instant::now();
        let dispatched = scheduler.dispatch(&config, now);
        assert_eq!(dispatched.len(), 1);
        let Dispatched { slot, item } = dispatched.into_iter().next().unwrap();
        let decision = scheduler.complete(slot, item, ReplyCode::OK, 3, &config, now).unwrap();
        assert_eq!(decision, RoutingDecision::Remove);
        assert_eq!(scheduler.queue_len(), 0);
    }

    #[test]
    fn exhausting_reconnect_attempts_surfaces_an_error() {
        let config = StaticConfig {
            reconnect_backoff_secs: vec![1],
            max_reconnect_attempts: 0,
            ..Default::default()
        };
        let mut scheduler = TransferScheduler::new(&config);
        scheduler.enqueue(QueueItem {
            id: CommandId(1),
            server: server(),
            command: Command::Raw("NOOP".into()),
            retry_count: 0,
            priority: 0,
        });
        let now = Instant::now();
        let dispatched = scheduler.dispatch(&config, now);
        let Dispatched { slot, item } = dispatched.into_iter().next().unwrap();
        let result = scheduler.complete(
            slot,
            item,
            ReplyCode::ERROR | ReplyCode::DISCONNECTED | ReplyCode::CRITICALERROR,
            0,
            &config,
            now,
        );
        assert!(matches!(result, Err(SchedulerError::ReconnectExhausted)));
    }

    #[test]
    fn empty_queue_after_completion_starts_the_action_countdown() {
        let config = StaticConfig::default();
        let mut scheduler = TransferScheduler::new(&config);
        scheduler.set_action_after_queue(QueueCompletionAction::Shutdown);
        scheduler.enqueue(QueueItem {
            id: CommandId(1),
            server: server(),
            command: Command::Raw("NOOP".into()),
            retry_count: 0,
            priority: 0,
        });
        let now = Instant::now();
        let dispatched = scheduler.dispatch(&config, now);
        let Dispatched { slot, item } = dispatched.into_iter().next().unwrap();
        scheduler.complete(slot, item, ReplyCode::OK, 3, &config, now).unwrap();
        assert!(scheduler.action_after_queue().is_warning());
    }
}
