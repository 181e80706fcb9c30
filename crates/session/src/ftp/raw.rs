//! The `Raw` command (spec §3): sends a single line verbatim and reports
//! the reply-code contract with no further interpretation.

use xfer_core::reply::ReplyCode;

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

pub struct RawOperation {
    line: String,
}

impl RawOperation {
    pub fn new(line: String) -> Self {
        Self { line }
    }
}

impl Operation for RawOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::raw"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(self.line.clone())
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        if reply.is_positive_completion() || reply.is_preliminary() {
            StepOutcome::Complete(ReplyCode::OK)
        } else {
            StepOutcome::Complete(ReplyCode::ERROR)
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        StepOutcome::Complete(reply)
    }
}
