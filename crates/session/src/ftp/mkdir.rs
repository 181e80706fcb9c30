//! The `MKD` operation (spec §4.4.3), creating ancestors one level at a
//! time when the target's parents don't exist yet.

use std::sync::{Arc, Mutex};

use cache::DirectoryCache;
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

/// Creates `target`, retrying one path segment at a time from the root
/// down when an intermediate `MKD` fails because its parent is missing,
/// mirroring upstream's `mkd` operation climbing back up on `550`.
pub struct MkdirOperation {
    server: Server,
    target: ServerPath,
    directory_cache: Arc<Mutex<DirectoryCache>>,
    /// The deepest ancestor (inclusive) not yet confirmed to exist,
    /// walking from `target` toward the root as failures occur.
    cursor: ServerPath,
    attempted_from_root: bool,
}

impl MkdirOperation {
    pub fn new(server: Server, target: ServerPath, directory_cache: Arc<Mutex<DirectoryCache>>) -> Self {
        Self {
            server,
            cursor: target.clone(),
            target,
            directory_cache,
            attempted_from_root: false,
        }
    }
}

impl Operation for MkdirOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::mkdir"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(format!("MKD {}", self.cursor))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        if reply.is_positive_completion() {
            if self.cursor == self.target {
                if let Some(parent) = self.target.parent() {
                    self.directory_cache.lock().unwrap().invalidate(&self.server, &parent);
                }
                return StepOutcome::Complete(ReplyCode::OK);
            }
            // An ancestor was just created; walk back down toward the
            // originally requested target, creating one more level.
            self.cursor = descend_toward(&self.cursor, &self.target);
            return StepOutcome::Send(format!("MKD {}", self.cursor));
        }
        if self.attempted_from_root {
            return StepOutcome::Complete(ReplyCode::ERROR);
        }
        match self.cursor.parent() {
            Some(parent) if !parent.is_empty() => {
                self.cursor = parent;
                StepOutcome::Send(format!("MKD {}", self.cursor))
            }
            _ => {
                self.attempted_from_root = true;
                StepOutcome::Complete(ReplyCode::ERROR)
            }
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        StepOutcome::Complete(reply)
    }
}

/// Finds the next segment of `target` one level below `ancestor`.
fn descend_toward(ancestor: &ServerPath, target: &ServerPath) -> ServerPath {
    let next_len = ancestor.segments().len() + 1;
    ancestor.add_segment(&target.segments()[ancestor.segments().len().min(next_len - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn cache() -> Arc<Mutex<DirectoryCache>> {
        Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))))
    }

    #[test]
    fn direct_success_completes_immediately() {
        let mut op = MkdirOperation::new(server(), ServerPath::parse_unix("/a/b"), cache());
        op.start();
        match op.on_event(&FtpReply::new(257, "created")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected completion"),
        }
    }

    #[test]
    fn climbs_to_parent_on_failure_then_descends() {
        let mut op = MkdirOperation::new(server(), ServerPath::parse_unix("/a/b"), cache());
        match op.start() {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "MKD /a/b"),
            _ => panic!(),
        }
        match op.on_event(&FtpReply::new(550, "no such parent")) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "MKD /a"),
            _ => panic!("expected climb to parent"),
        }
        match op.on_event(&FtpReply::new(257, "created")) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "MKD /a/b"),
            _ => panic!("expected descent back to target"),
        }
        match op.on_event(&FtpReply::new(257, "created")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected final completion"),
        }
    }
}
