//! SFTP session operations (spec §4.4.5), driven through a subprocess via
//! [`crate::line_framed`] rather than an in-process SSH implementation.

use xfer_core::reply::ReplyCode;

use crate::line_framed::FramedMessage;
use crate::op::{Operation, StepOutcome};

/// A connect/login round trip: sends the subprocess a `CONNECT` request
/// and waits for either an `S OK` status line or an `S ERR <reason>`.
pub struct ConnectOperation {
    host: String,
    port: u16,
    user: String,
}

impl ConnectOperation {
    pub fn new(host: String, port: u16, user: String) -> Self {
        Self { host, port, user }
    }
}

impl Operation for ConnectOperation {
    type Event = FramedMessage;

    fn name(&self) -> &'static str {
        "sftp::connect"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FramedMessage> {
        StepOutcome::Send(crate::line_framed::format_line(
            "CONNECT",
            &format!("{}:{} {}", self.host, self.port, self.user),
        ))
    }

    fn on_event(&mut self, event: &FramedMessage) -> StepOutcome<FramedMessage> {
        match event.tag.as_str() {
            "S" if event.argument.starts_with("OK") => StepOutcome::Complete(ReplyCode::OK),
            "S" if event.argument.starts_with("ERR") => {
                StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::DISCONNECTED)
            }
            _ => StepOutcome::Pending,
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FramedMessage> {
        StepOutcome::Complete(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_completes_successfully() {
        let mut op = ConnectOperation::new("host".into(), 22, "user".into());
        match op.start() {
            StepOutcome::Send(line) => assert_eq!(line, "CONNECT host:22 user\n"),
            _ => panic!(),
        }
        match op.on_event(&FramedMessage {
            tag: "S".into(),
            argument: "OK".into(),
        }) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
    }

    #[test]
    fn error_status_disconnects() {
        let mut op = ConnectOperation::new("host".into(), 22, "user".into());
        op.start();
        match op.on_event(&FramedMessage {
            tag: "S".into(),
            argument: "ERR auth failed".into(),
        }) {
            StepOutcome::Complete(reply) => assert!(reply.is_disconnected()),
            _ => panic!(),
        }
    }
}
