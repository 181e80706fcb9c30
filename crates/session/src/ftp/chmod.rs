//! The `SITE CHMOD` operation (spec §4.4.3). Not every FTP server
//! implements it; a `NOTSUPPORTED`-class failure is expected and handled
//! by the caller, not retried here.

use xfer_core::reply::ReplyCode;
use xfer_core::server::ServerPath;

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

pub struct ChmodOperation {
    path: ServerPath,
    file: String,
    mode: String,
}

impl ChmodOperation {
    pub fn new(path: ServerPath, file: String, mode: String) -> Self {
        Self { path, file, mode }
    }
}

impl Operation for ChmodOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::chmod"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(format!(
            "SITE CHMOD {} {}",
            self.mode,
            self.path.format_filename(&self.file, false)
        ))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        if reply.is_positive_completion() {
            StepOutcome::Complete(ReplyCode::OK)
        } else if reply.code == 500 || reply.code == 502 {
            StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::NOTSUPPORTED)
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

    #[test]
    fn unrecognized_site_command_is_reported_as_unsupported() {
        let mut op = ChmodOperation::new(ServerPath::parse_unix("/a"), "f".into(), "644".into());
        op.start();
        match op.on_event(&FtpReply::new(500, "unknown command")) {
            StepOutcome::Complete(reply) => assert!(reply.contains(ReplyCode::NOTSUPPORTED)),
            _ => panic!(),
        }
    }

    #[test]
    fn success_reports_ok() {
        let mut op = ChmodOperation::new(ServerPath::parse_unix("/a"), "f".into(), "644".into());
        op.start();
        match op.on_event(&FtpReply::new(200, "chmod ok")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
    }
}
