//! Line-framed subprocess messaging, shared by the SFTP and
//! object-storage sessions (spec §4.4.5). Both protocols are actually
//! driven through a helper subprocess that speaks a simple
//! newline-delimited message protocol over its stdout/stdin; this module
//! owns only the framing, not the subprocess lifetime itself (spec §1's
//! Non-goals explicitly exclude managing that lifetime beyond the
//! line-framed message level).

/// One message received from the subprocess, already split into a
/// one-letter (or one-word) tag and its argument text. The wire format
/// itself — e.g. `S <status> <text>` for status lines, `L <path>` while
/// streaming a listing — is a subprocess-specific convention layered on
/// top of this framing; decoding the tag into a protocol-specific enum is
/// the `sftp`/`object_storage` module's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    pub tag: String,
    pub argument: String,
}

impl FramedMessage {
    fn parse_line(line: &str) -> Self {
        match line.split_once(' ') {
            Some((tag, rest)) => FramedMessage {
                tag: tag.to_string(),
                argument: rest.to_string(),
            },
            None => FramedMessage {
                tag: line.to_string(),
                argument: String::new(),
            },
        }
    }
}

/// Accumulates raw subprocess output into whole lines, the way an FTP
/// control socket's reader accumulates bytes into whole replies.
/// Carriage returns are stripped; a trailing partial line is buffered
/// until more bytes arrive.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds newly received bytes (already UTF-8 decoded by the host,
    /// since the subprocess boundary is not a raw-byte concern this crate
    /// owns) and returns every whole message completed by this chunk, in
    /// order.
    pub fn feed(&mut self, chunk: &str) -> Vec<FramedMessage> {
        self.buffer.push_str(chunk);
        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                messages.push(FramedMessage::parse_line(line));
            }
        }
        messages
    }

    /// Whether a partial, not-yet-terminated line is currently buffered.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Formats an outgoing request line the way the framer expects it back:
/// `tag argument\n`.
pub fn format_line(tag: &str, argument: &str) -> String {
    if argument.is_empty() {
        format!("{tag}\n")
    } else {
        format!("{tag} {argument}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_with_trailing_newline_yields_one_message() {
        let mut framer = LineFramer::new();
        let messages = framer.feed("S OK ready\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].tag, "S");
        assert_eq!(messages[0].argument, "OK ready");
    }

    #[test]
    fn partial_line_is_buffered_until_completed() {
        let mut framer = LineFramer::new();
        assert!(framer.feed("S O").is_empty());
        assert!(framer.has_pending());
        let messages = framer.feed("K\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].argument, "OK");
        assert!(!framer.has_pending());
    }

    #[test]
    fn multiple_lines_in_one_chunk_are_all_returned_in_order() {
        let mut framer = LineFramer::new();
        let messages = framer.feed("L a\nL b\nL c\n");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].argument, "b");
    }

    #[test]
    fn carriage_returns_are_stripped() {
        let mut framer = LineFramer::new();
        let messages = framer.feed("S OK\r\n");
        assert_eq!(messages[0].argument, "OK");
    }

    #[test]
    fn format_line_round_trips_through_the_framer() {
        let mut framer = LineFramer::new();
        let line = format_line("GET", "/remote/path");
        let messages = framer.feed(&line);
        assert_eq!(messages[0].tag, "GET");
        assert_eq!(messages[0].argument, "/remote/path");
    }
}
