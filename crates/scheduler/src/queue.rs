//! The in-memory pending-transfer queue (spec §4.6): a forest of queued
//! commands grouped by server, persisted by `crates/persistence` but
//! otherwise owned and ordered here.

use std::collections::VecDeque;

use xfer_core::command::{Command, CommandId, TransferDirection};
use xfer_core::server::Server;

/// One pending command plus the bookkeeping the scheduler needs around
/// it: which server it targets, how many times it has already been
/// retried, and whether it is allowed to borrow an otherwise-idle
/// interactive session.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: CommandId,
    pub server: Server,
    pub command: Command,
    pub retry_count: u32,
    /// Higher runs first. Queue items default to `0`; items raised by
    /// the user (spec §4.6 step 3, "highest-priority idle file-item")
    /// jump the per-server FIFO rather than waiting their turn.
    pub priority: i32,
}

impl QueueItem {
    /// The transfer direction this item would occupy a slot as, or
    /// `None` for commands that aren't file transfers (those don't
    /// count against `concurrent_download_limit`/`concurrent_upload_limit`).
    pub fn direction(&self) -> Option<TransferDirection> {
        match &self.command {
            Command::FileTransfer(spec) => Some(spec.direction),
            _ => None,
        }
    }
}

/// A FIFO per server ordered by priority, with round-robin dispatch
/// across servers so one server's huge backlog doesn't starve another's
/// small one — matching upstream's queue giving each active server its
/// own fair share of simultaneous transfer slots.
#[derive(Default)]
pub struct TransferQueue {
    by_server: Vec<(Server, VecDeque<QueueItem>)>,
    next_server_index: usize,
}

impl TransferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item` ahead of any already-queued item for the same
    /// server with strictly lower priority, and behind any with equal or
    /// higher priority — a stable priority-ordered FIFO.
    pub fn enqueue(&mut self, item: QueueItem) {
        if let Some((_, queue)) = self.by_server.iter_mut().find(|(s, _)| s == &item.server) {
            let position = queue.iter().position(|queued| queued.priority < item.priority).unwrap_or(queue.len());
            queue.insert(position, item);
        } else {
            let server = item.server.clone();
            let mut queue = VecDeque::new();
            queue.push_back(item);
            self.by_server.push((server, queue));
        }
    }

    /// Looks at the next item that would be popped for `server` without
    /// removing it, letting the scheduler check its transfer direction
    /// before committing to dispatch it.
    pub fn peek_for_server(&self, server: &Server) -> Option<&QueueItem> {
        self.by_server.iter().find(|(s, _)| s == server).and_then(|(_, q)| q.front())
    }

    pub fn is_empty(&self) -> bool {
        self.by_server.iter().all(|(_, q)| q.is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_server.iter().map(|(_, q)| q.len()).sum()
    }

    /// Returns the next server (round-robin) that has at least one
    /// queued item and for which `allow` returns `true` (the caller uses
    /// this to skip servers already at their connection cap).
    pub fn next_ready_server(&mut self, mut allow: impl FnMut(&Server) -> bool) -> Option<Server> {
        if self.by_server.is_empty() {
            return None;
        }
        let len = self.by_server.len();
        for offset in 0..len {
            let index = (self.next_server_index + offset) % len;
            let (server, queue) = &self.by_server[index];
            if !queue.is_empty() && allow(server) {
                self.next_server_index = (index + 1) % len;
                return Some(server.clone());
            }
        }
        None
    }

    /// Pops the next queued item for `server`, if any.
    pub fn pop_for_server(&mut self, server: &Server) -> Option<QueueItem> {
        self.by_server
            .iter_mut()
            .find(|(s, _)| s == server)
            .and_then(|(_, q)| q.pop_front())
    }

    /// Re-queues `item` at the front of its server's queue, used when a
    /// retryable failure means the same command should be attempted
    /// again before anything else queued for that server.
    pub fn requeue_front(&mut self, item: QueueItem) {
        if let Some((_, queue)) = self.by_server.iter_mut().find(|(s, _)| s == &item.server) {
            queue.push_front(item);
        } else {
            self.enqueue(item);
        }
    }

    pub fn remove(&mut self, id: CommandId) -> Option<QueueItem> {
        for (_, queue) in &mut self.by_server {
            if let Some(pos) = queue.iter().position(|item| item.id == id) {
                return queue.remove(pos);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::{Encoding, LogonType, Protocol};

    fn server(host: &str) -> Server {
        Server {
            protocol: Protocol::Ftp,
            host: host.into(),
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

    fn item(id: u64, server: Server) -> QueueItem {
        QueueItem {
            id: CommandId(id),
            server,
            command: Command::Raw("NOOP".into()),
            retry_count: 0,
            priority: 0,
        }
    }

    #[test]
    fn round_robin_alternates_between_servers() {
        let mut queue = TransferQueue::new();
        queue.enqueue(item(1, server("a")));
        queue.enqueue(item(2, server("b")));
        let first = queue.next_ready_server(|_| true).unwrap();
        queue.pop_for_server(&first);
        let second = queue.next_ready_server(|_| true).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn disallowed_server_is_skipped() {
        let mut queue = TransferQueue::new();
        queue.enqueue(item(1, server("busy")));
        queue.enqueue(item(2, server("free")));
        let chosen = queue.next_ready_server(|s| s.host != "busy").unwrap();
        assert_eq!(chosen.host, "free");
    }

    #[test]
    fn requeue_front_takes_priority_over_later_items() {
        let mut queue = TransferQueue::new();
        let s = server("a");
        queue.enqueue(item(1, s.clone()));
        queue.enqueue(item(2, s.clone()));
        let failed = queue.pop_for_server(&s).unwrap();
        queue.requeue_front(failed.clone());
        let next = queue.pop_for_server(&s).unwrap();
        assert_eq!(next.id, failed.id);
    }

    #[test]
    fn higher_priority_item_jumps_the_fifo() {
        let mut queue = TransferQueue::new();
        let s = server("a");
        queue.enqueue(item(1, s.clone()));
        queue.enqueue(item(2, s.clone()));
        let mut urgent = item(3, s.clone());
        urgent.priority = 10;
        queue.enqueue(urgent);
        assert_eq!(queue.peek_for_server(&s).unwrap().id, CommandId(3));
    }

    #[test]
    fn equal_priority_items_stay_in_fifo_order() {
        let mut queue = TransferQueue::new();
        let s = server("a");
        queue.enqueue(item(1, s.clone()));
        queue.enqueue(item(2, s.clone()));
        assert_eq!(queue.peek_for_server(&s).unwrap().id, CommandId(1));
    }
}
