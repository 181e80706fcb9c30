//! FTP control-session operations (spec §4.4), each a state machine
//! driven by [`crate::op::Operation`] and fed [`FtpReply`] events.

pub mod change_dir;
pub mod chmod;
pub mod delete;
pub mod list;
mod mdtm;
pub mod mkdir;
pub mod raw;
pub mod removedir;
pub mod rename;
pub mod transfer;

/// One complete FTP server reply: a three-digit code and the (possibly
/// multi-line) text that accompanied it. Assembling multi-line replies
/// from raw socket bytes is the control-connection reader's job, not an
/// operation's; operations only ever see whole replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpReply {
    pub fn new(code: u16, line: impl Into<String>) -> Self {
        Self {
            code,
            lines: vec![line.into()],
        }
    }

    /// Whether this is a 2xx success reply.
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Whether this is a 1xx preliminary reply (more replies follow for
    /// the same command).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether this is a 3xx intermediate reply requiring a follow-up
    /// command (e.g. `331` after `USER`, expecting `PASS`).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Whether this is a 4xx/5xx failure.
    pub fn is_failure(&self) -> bool {
        self.code >= 400
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }
}

/// Parses an already-line-framed FTP directory listing into entries. The
/// actual text-parsing grammar is explicitly out of scope (spec §1's
/// Non-goals); callers supply an implementation appropriate to the
/// listing format in use (Unix `ls -l`, MLSD, DOS).
pub trait ListingParser: Send + Sync {
    fn parse(&self, lines: &[String]) -> Vec<xfer_core::direntry::DirEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classification_by_first_digit() {
        assert!(FtpReply::new(230, "logged in").is_positive_completion());
        assert!(FtpReply::new(150, "opening data").is_preliminary());
        assert!(FtpReply::new(331, "need password").is_intermediate());
        assert!(FtpReply::new(550, "no such file").is_failure());
    }
}
