//! The `CWD` operation (spec §4.4.1), grounded on upstream's
//! `CFtpChangeDirOpData`/`ftp/cwd.cpp`.

use std::sync::{Arc, Mutex};

use cache::{DirectoryCache, PathCache};
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::op::{Operation, StepOutcome};

use super::mkdir::MkdirOperation;
use super::FtpReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing sent yet; about to consult the path cache.
    Init,
    /// `CWD`/`CDUP` sent, waiting for its reply.
    AwaitCwd,
    /// `CWD` succeeded; `PWD` sent to learn the canonical resulting
    /// path so it can be cached, waiting for its reply.
    AwaitPwd,
}

/// Changes the working directory to `base.join(subdir)` (or to `base`
/// itself when `subdir` is empty, a no-op per spec §4.4.1).
pub struct ChangeDirOperation {
    server: Server,
    base: ServerPath,
    subdir: String,
    path_cache: Arc<Mutex<PathCache>>,
    state: State,
    /// Set once a `CWD`/`PWD` round trip resolves the target, so the
    /// caller can read back what directory the session is now in.
    resolved: Option<ServerPath>,
    /// Set by [`Self::with_try_mkdir_on_fail`]: a failed `CWD` pushes a
    /// `Mkdir` sub-operation for the target and retries once, the
    /// "maybe-make-dir" step of an upload that targets a directory that
    /// doesn't exist yet.
    try_mkdir: Option<Arc<Mutex<DirectoryCache>>>,
    /// Set by [`Self::with_link_discovery`]: a failed `CWD` completes
    /// with [`ReplyCode::LINKNOTDIR`] instead of a plain error, letting a
    /// caller probing whether a symlink resolves to a directory treat it
    /// as a file instead.
    link_discovery: bool,
    mkdir_attempted: bool,
    using_cdup: bool,
    cdup_fallback_attempted: bool,
}

impl ChangeDirOperation {
    pub fn new(
        server: Server,
        base: ServerPath,
        subdir: String,
        path_cache: Arc<Mutex<PathCache>>,
    ) -> Self {
        Self {
            server,
            base,
            subdir,
            path_cache,
            state: State::Init,
            resolved: None,
            try_mkdir: None,
            link_discovery: false,
            mkdir_attempted: false,
            using_cdup: false,
            cdup_fallback_attempted: false,
        }
    }

    pub fn with_try_mkdir_on_fail(mut self, directory_cache: Arc<Mutex<DirectoryCache>>) -> Self {
        self.try_mkdir = Some(directory_cache);
        self
    }

    pub fn with_link_discovery(mut self) -> Self {
        self.link_discovery = true;
        self
    }

    pub fn resolved_path(&self) -> Option<&ServerPath> {
        self.resolved.as_ref()
    }

    fn target_no_subdir(&self) -> bool {
        self.subdir.is_empty()
    }

    fn command_path(&self) -> ServerPath {
        if self.target_no_subdir() {
            self.base.clone()
        } else {
            self.base.add_segment(&self.subdir)
        }
    }

    /// Reacts to a failed `CWD`/`CDUP`: first falls back from `CDUP` to a
    /// plain `CWD ..`, then (if requested) tries creating the missing
    /// directory, then either reports `LINKNOTDIR` or a plain failure.
    fn handle_cwd_failure(&mut self) -> StepOutcome<FtpReply> {
        if self.using_cdup && !self.cdup_fallback_attempted {
            self.using_cdup = false;
            self.cdup_fallback_attempted = true;
            return StepOutcome::Send(format!("CWD {}", self.command_path()));
        }
        if let Some(directory_cache) = self.try_mkdir.clone() {
            if !self.mkdir_attempted {
                self.mkdir_attempted = true;
                return StepOutcome::PushChild(Box::new(MkdirOperation::new(
                    self.server.clone(),
                    self.command_path(),
                    directory_cache,
                )));
            }
        }
        if self.link_discovery {
            return StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::LINKNOTDIR);
        }
        StepOutcome::Complete(ReplyCode::ERROR)
    }
}

impl Operation for ChangeDirOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::cwd"
    }

    fn state(&self) -> u32 {
        self.state as u32
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        // Spec §4.4.1: CWD with an empty path is a no-op.
        if self.target_no_subdir() && self.base.is_empty() {
            self.resolved = Some(self.base.clone());
            return StepOutcome::Complete(ReplyCode::OK);
        }
        // Two-level cache lookup per `cwd_init`: the combined path first,
        // then the parent's cached target for the same subdir name.
        if let Some(target) = self
            .path_cache
            .lock()
            .unwrap()
            .lookup(&self.server, &self.base, &self.subdir)
        {
            self.resolved = Some(target);
            return StepOutcome::Complete(ReplyCode::OK);
        }
        self.state = State::AwaitCwd;
        if self.subdir == ".." {
            self.using_cdup = true;
            StepOutcome::Send("CDUP".to_string())
        } else {
            StepOutcome::Send(format!("CWD {}", self.command_path()))
        }
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        match self.state {
            State::AwaitCwd => {
                if reply.is_positive_completion() {
                    self.using_cdup = false;
                    self.state = State::AwaitPwd;
                    StepOutcome::Send("PWD".to_string())
                } else {
                    self.handle_cwd_failure()
                }
            }
            State::AwaitPwd => {
                if reply.is_positive_completion() {
                    let target = parse_pwd_reply(reply.first_line())
                        .unwrap_or_else(|| self.command_path());
                    self.path_cache.lock().unwrap().store(
                        &self.server,
                        &self.base,
                        &self.subdir,
                        target.clone(),
                    );
                    self.resolved = Some(target);
                    StepOutcome::Complete(ReplyCode::OK)
                } else {
                    // The directory change itself succeeded; failing to
                    // confirm it with PWD is not fatal, just uncached.
                    self.resolved = Some(self.command_path());
                    StepOutcome::Complete(ReplyCode::OK)
                }
            }
            State::Init => StepOutcome::Pending,
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        if reply.is_success() {
            // The Mkdir sub-op created the missing directory; retry the
            // CWD that originally failed.
            self.state = State::AwaitCwd;
            StepOutcome::Send(format!("CWD {}", self.command_path()))
        } else {
            StepOutcome::Complete(reply)
        }
    }
}

/// Extracts the quoted path out of a `257 "/some/path" is current
/// directory` reply line.
fn parse_pwd_reply(line: &str) -> Option<ServerPath> {
    let first = line.find('"')?;
    let rest = &line[first + 1..];
    let second = rest.find('"')?;
    let path = &rest[..second];
    Some(ServerPath::parse_unix(path))
}
