//! The `DELE` operation (spec §4.4.3).

use std::sync::{Arc, Mutex};

use cache::DirectoryCache;
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

pub struct DeleteOperation {
    server: Server,
    path: ServerPath,
    file: String,
    directory_cache: Arc<Mutex<DirectoryCache>>,
}

impl DeleteOperation {
    pub fn new(server: Server, path: ServerPath, file: String, directory_cache: Arc<Mutex<DirectoryCache>>) -> Self {
        Self {
            server,
            path,
            file,
            directory_cache,
        }
    }
}

impl Operation for DeleteOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::delete"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(format!("DELE {}", self.path.format_filename(&self.file, false)))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        if reply.is_positive_completion() {
            self.directory_cache.lock().unwrap().invalidate(&self.server, &self.path);
            StepOutcome::Complete(ReplyCode::OK)
        } else {
            StepOutcome::Complete(ReplyCode::ERROR)
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        StepOutcome::Complete(reply)
    }
}
