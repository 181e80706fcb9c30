//! The `RMD` operation (spec §4.4.3).
//!
//! Upstream's own comment on the equivalent operation admits it is "not
//! 100% foolproof": a directory removal can partially succeed against
//! servers that don't atomically fail the whole tree, leaving some
//! children deleted and others not. This implementation does not attempt
//! to detect or repair that partial-failure case; see `DESIGN.md`'s Open
//! Question entry for the decision to leave it as upstream does.

use std::sync::{Arc, Mutex};

use cache::DirectoryCache;
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

pub struct RemoveDirOperation {
    server: Server,
    path: ServerPath,
    dir: String,
    directory_cache: Arc<Mutex<DirectoryCache>>,
}

impl RemoveDirOperation {
    pub fn new(server: Server, path: ServerPath, dir: String, directory_cache: Arc<Mutex<DirectoryCache>>) -> Self {
        Self {
            server,
            path,
            dir,
            directory_cache,
        }
    }
}

impl Operation for RemoveDirOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::removedir"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(format!("RMD {}", self.path.format_filename(&self.dir, false)))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        if reply.is_positive_completion() {
            let removed = self.path.add_segment(&self.dir);
            self.directory_cache.lock().unwrap().invalidate(&self.server, &self.path);
            self.directory_cache
                .lock()
                .unwrap()
                .invalidate_subtree(&self.server, &removed);
            StepOutcome::Complete(ReplyCode::OK)
        } else {
            StepOutcome::Complete(ReplyCode::ERROR)
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        StepOutcome::Complete(reply)
    }
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

    #[test]
    fn success_invalidates_both_parent_and_subtree() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let s = server();
        cache.lock().unwrap().store(
            &s,
            &ServerPath::parse_unix("/x/sub"),
            xfer_core::direntry::DirectoryListing::new(vec![], std::time::Instant::now()),
            std::time::Instant::now(),
        );
        let mut op = RemoveDirOperation::new(s.clone(), ServerPath::parse_unix("/x"), "sub".into(), cache.clone());
        op.start();
        match op.on_event(&FtpReply::new(250, "removed")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
        assert!(cache
            .lock()
            .unwrap()
            .lookup(&s, &ServerPath::parse_unix("/x/sub"), std::time::Instant::now())
            .is_none());
    }
}
