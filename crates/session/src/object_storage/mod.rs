//! Object-storage session operations (spec §4.4.5), also driven through a
//! subprocess via [`crate::line_framed`].

use xfer_core::reply::ReplyCode;
use xfer_core::server::ServerPath;

use crate::line_framed::FramedMessage;
use crate::op::{Operation, StepOutcome};

/// Resolves a bucket-relative key into the canonical [`ServerPath`] the
/// rest of the engine uses, the object-storage equivalent of FTP's
/// `PWD`/`CWD` round trip. Object stores have no real directory
/// hierarchy, so this "resolve" step is the meta-operation spec §4.4.5
/// calls out as standing in for a change-directory operation.
pub struct ResolveOperation {
    bucket: String,
    key_prefix: String,
    resolved: Option<ServerPath>,
}

impl ResolveOperation {
    pub fn new(bucket: String, key_prefix: String) -> Self {
        Self {
            bucket,
            key_prefix,
            resolved: None,
        }
    }

    pub fn resolved_path(&self) -> Option<&ServerPath> {
        self.resolved.as_ref()
    }
}

impl Operation for ResolveOperation {
    type Event = FramedMessage;

    fn name(&self) -> &'static str {
        "object_storage::resolve"
    }

    fn state(&self) -> u32 {
        0
    }

    fn start(&mut self) -> StepOutcome<FramedMessage> {
        StepOutcome::Send(crate::line_framed::format_line(
            "RESOLVE",
            &format!("{}/{}", self.bucket, self.key_prefix),
        ))
    }

    fn on_event(&mut self, event: &FramedMessage) -> StepOutcome<FramedMessage> {
        match event.tag.as_str() {
            "R" => {
                self.resolved = Some(ServerPath::parse_unix(&event.argument));
                StepOutcome::Complete(ReplyCode::OK)
            }
            "S" if event.argument.starts_with("ERR") => StepOutcome::Complete(ReplyCode::ERROR),
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
    fn resolved_key_becomes_a_server_path() {
        let mut op = ResolveOperation::new("bucket".into(), "a/b".into());
        match op.start() {
            StepOutcome::Send(line) => assert_eq!(line, "RESOLVE bucket/a/b\n"),
            _ => panic!(),
        }
        match op.on_event(&FramedMessage {
            tag: "R".into(),
            argument: "/a/b".into(),
        }) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
        assert_eq!(op.resolved_path(), Some(&ServerPath::parse_unix("/a/b")));
    }
}
