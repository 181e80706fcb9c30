//! The file-transfer operation (spec §4.4.3): sequences a change-dir into
//! the remote path, `SIZE`/`MDTM` probing, the overwrite check, a resume
//! test against the 2/4GB resume-bug capabilities, and `TYPE`/`REST`/
//! `STOR`/`RETR`/`APPE`, grounded on upstream's `CFtpFileTransferOpData`.
//! Opening the data connection and moving bytes across it is explicitly
//! out of scope (spec §1's Non-goals, "no raw socket/TLS bytes"); this
//! operation only sequences the control-connection commands around that
//! transfer and the cache/capability bookkeeping that goes with it.

use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use cache::capabilities::{Capability, CapabilityName, CapabilityRegistry};
use cache::DirectoryCache;
use xfer_core::command::{ExistsAction, TransferDirection, TransferSpec};
use xfer_core::notification::AsyncRequest;
use xfer_core::options::ConfigOracle;
use xfer_core::reply::ReplyCode;
use xfer_core::server::Server;

use crate::op::{Operation, StepOutcome};

use super::change_dir::ChangeDirOperation;
use super::mdtm::{parse_leading_digits, parse_mdtm_reply};
use super::FtpReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    AwaitChangeDir,
    AwaitSize,
    AwaitMdtm,
    AwaitOverwriteAnswer,
    AwaitResumeTest,
    AwaitTransferStart,
    AwaitTransferComplete,
    AwaitMfmt,
}

/// The 4GB boundary upstream's `TestResumeCapability` checks files against
/// (`1ll << 32`); the 2GB boundary is `1ll << 31`.
const RESUME_BUG_4GB: u64 = 1 << 32;
const RESUME_BUG_2GB: u64 = 1 << 31;

pub struct TransferOperation {
    server: Server,
    spec: TransferSpec,
    directory_cache: Arc<Mutex<DirectoryCache>>,
    capabilities: Arc<Mutex<CapabilityRegistry>>,
    path_cache: Arc<Mutex<cache::PathCache>>,
    config: Arc<dyn ConfigOracle>,
    state: State,
    remote_size: Option<u64>,
    remote_mtime: Option<SystemTime>,
    /// Supplied by the host before `start()`, since local filesystem
    /// inspection is out of scope for this operation; `None` if the host
    /// has no local counterpart to compare against (a brand-new upload
    /// target, say).
    local_size: Option<u64>,
    /// The local file's modification time, supplied by the host for an
    /// upload so a post-transfer `MFMT` can be sent; unused for downloads.
    local_mtime: Option<SystemTime>,
}

impl TransferOperation {
    pub fn new(
        server: Server,
        spec: TransferSpec,
        directory_cache: Arc<Mutex<DirectoryCache>>,
        capabilities: Arc<Mutex<CapabilityRegistry>>,
        path_cache: Arc<Mutex<cache::PathCache>>,
        config: Arc<dyn ConfigOracle>,
    ) -> Self {
        Self {
            server,
            spec,
            directory_cache,
            capabilities,
            path_cache,
            config,
            state: State::Init,
            remote_size: None,
            remote_mtime: None,
            local_size: None,
            local_mtime: None,
        }
    }

    /// Sets the local file's size, consulted by the resume-bug test (spec
    /// §4.4.3, P13). A no-op once the operation has started.
    pub fn set_local_size(&mut self, size: Option<u64>) {
        self.local_size = size;
    }

    /// Sets the local file's modification time, consulted by the
    /// post-upload `MFMT` step. A no-op once the operation has started.
    pub fn set_local_mtime(&mut self, time: Option<SystemTime>) {
        self.local_mtime = time;
    }

    /// The remote file's modification time learned via `MDTM` or the
    /// directory cache, for the host to apply to the local file after a
    /// completed download (spec §4.4.3, "post-download mtime set"). Out
    /// of scope for this operation itself since it requires touching the
    /// local filesystem.
    pub fn downloaded_remote_mtime(&self) -> Option<SystemTime> {
        self.remote_mtime.filter(|_| self.spec.direction == TransferDirection::Download)
    }

    fn target(&self) -> String {
        self.spec.remote_path.format_filename(&self.spec.remote_file, false)
    }

    fn transfer_command(&self) -> String {
        let target = self.target();
        match (self.spec.direction, self.spec.resume_offset) {
            (TransferDirection::Upload, Some(offset)) if offset > 0 => format!("APPE {target}"),
            (TransferDirection::Upload, _) => format!("STOR {target}"),
            (TransferDirection::Download, _) => format!("RETR {target}"),
        }
    }

    /// Looks up the cached directory entry for the remote file, applying
    /// its size/mtime if present and not marked unsure, then decides
    /// whether `SIZE`/`MDTM` are still needed.
    fn consult_cache_then_proceed(&mut self) -> StepOutcome<FtpReply> {
        let now = Instant::now();
        let cached = self
            .directory_cache
            .lock()
            .unwrap()
            .lookup_file(&self.server, &self.spec.remote_path, &self.spec.remote_file, now);
        if let Some(entry) = cached.filter(|e| !e.is_unsure()) {
            self.remote_size = Some(entry.size);
            self.remote_mtime = entry.modified;
            if self.remote_mtime.is_none() && self.wants_mdtm() {
                self.state = State::AwaitMdtm;
                return StepOutcome::Send(format!("MDTM {}", self.target()));
            }
            return self.check_overwrite_then_resume();
        }
        self.state = State::AwaitSize;
        StepOutcome::Send(format!("SIZE {}", self.target()))
    }

    fn wants_mdtm(&self) -> bool {
        self.spec.direction == TransferDirection::Download
            && self.config.preserve_timestamps()
            && self
                .capabilities
                .lock()
                .unwrap()
                .get(&self.server, CapabilityName::MdtmCommand)
                .is_supported()
    }

    /// Raises the overwrite confirmation to the host when the transfer's
    /// `exists_action` asks for one, per `CheckOverwriteFile`; otherwise
    /// proceeds straight to the resume test.
    fn check_overwrite_then_resume(&mut self) -> StepOutcome<FtpReply> {
        if self.spec.exists_action == ExistsAction::Ask {
            self.state = State::AwaitOverwriteAnswer;
            return StepOutcome::AsyncRequest(AsyncRequest::FileExists {
                local_path: self.spec.local_path.clone(),
                remote_path: self.spec.remote_path.clone(),
                remote_file: self.spec.remote_file.clone(),
                local_size: self.local_size,
                remote_size: self.remote_size,
            });
        }
        self.begin_resume_test()
    }

    /// The 2GB/4GB resume-bug probe (spec §4.4.3, P13): only meaningful
    /// for a resumed download of a large file whose server capability is
    /// not already known to lack the bug. A known-buggy server with
    /// matching sizes ends the transfer early rather than wasting a round
    /// trip; an unknown capability against a larger remote file probes it
    /// with a one-byte-overlap `RETR`.
    fn begin_resume_test(&mut self) -> StepOutcome<FtpReply> {
        let Some(offset) = self.spec.resume_offset.filter(|&o| o > 0) else {
            return self.begin_transfer();
        };
        if self.spec.direction != TransferDirection::Download {
            return self.begin_transfer();
        }
        let local_size = offset;
        let remote_size = self.remote_size.unwrap_or(0);
        for (threshold, name) in [(RESUME_BUG_4GB, CapabilityName::Resume4gbBug), (RESUME_BUG_2GB, CapabilityName::Resume2gbBug)] {
            if local_size < threshold {
                continue;
            }
            match self.capabilities.lock().unwrap().get(&self.server, name) {
                Capability::Yes => {
                    if remote_size == local_size {
                        return StepOutcome::Complete(ReplyCode::OK);
                    }
                    return StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::CRITICALERROR);
                }
                Capability::Unknown if remote_size > local_size => {
                    self.state = State::AwaitResumeTest;
                    return StepOutcome::Send(format!("RETR {}", self.target()));
                }
                _ => {}
            }
        }
        self.begin_transfer()
    }

    fn begin_transfer(&mut self) -> StepOutcome<FtpReply> {
        self.state = State::AwaitTransferStart;
        StepOutcome::Send(self.transfer_command())
    }

    fn record_resume_bug_result(&mut self, succeeded: bool) {
        let threshold_name = if self.spec.resume_offset.unwrap_or(0) >= RESUME_BUG_4GB {
            CapabilityName::Resume4gbBug
        } else {
            CapabilityName::Resume2gbBug
        };
        let mut caps = self.capabilities.lock().unwrap();
        caps.set(&self.server, threshold_name, if succeeded { Capability::No } else { Capability::Yes });
    }

    fn finish(&mut self) -> StepOutcome<FtpReply> {
        if self.spec.direction == TransferDirection::Upload {
            self.directory_cache
                .lock()
                .unwrap()
                .invalidate(&self.server, &self.spec.remote_path);
            self.path_cache
                .lock()
                .unwrap()
                .invalidate_path(&self.server, &self.spec.remote_path.add_segment(&self.spec.remote_file), "");
        }
        StepOutcome::Complete(ReplyCode::OK)
    }
}

impl Operation for TransferOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::transfer"
    }

    fn state(&self) -> u32 {
        self.state as u32
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        self.state = State::AwaitChangeDir;
        let mut change_dir = ChangeDirOperation::new(
            self.server.clone(),
            self.spec.remote_path.clone(),
            String::new(),
            self.path_cache.clone(),
        );
        if self.spec.direction == TransferDirection::Upload {
            // The "maybe-make-dir" step of an upload: a missing target
            // directory is created rather than failing the transfer.
            change_dir = change_dir.with_try_mkdir_on_fail(self.directory_cache.clone());
        }
        StepOutcome::PushChild(Box::new(change_dir))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        match self.state {
            State::Init | State::AwaitChangeDir => StepOutcome::Pending,
            State::AwaitSize => {
                if reply.is_positive_completion() && reply.first_line().starts_with("213 ") {
                    self.capabilities.lock().unwrap().set(&self.server, CapabilityName::SizeCommand, Capability::Yes);
                    if let Some(size) = parse_leading_digits(&reply.first_line()[4..]) {
                        self.remote_size = Some(size);
                    }
                    if self.wants_mdtm() {
                        self.state = State::AwaitMdtm;
                        return StepOutcome::Send(format!("MDTM {}", self.target()));
                    }
                    self.check_overwrite_then_resume()
                } else if self.config.preserve_timestamps() && self.spec.direction == TransferDirection::Download {
                    self.state = State::AwaitMdtm;
                    StepOutcome::Send(format!("MDTM {}", self.target()))
                } else {
                    self.check_overwrite_then_resume()
                }
            }
            State::AwaitMdtm => {
                if reply.is_positive_completion() {
                    if let Some(mtime) = parse_mdtm_reply(reply.first_line()) {
                        self.remote_mtime = Some(mtime);
                        self.capabilities.lock().unwrap().set(&self.server, CapabilityName::MdtmCommand, Capability::Yes);
                    }
                }
                self.check_overwrite_then_resume()
            }
            State::AwaitOverwriteAnswer => StepOutcome::Pending,
            State::AwaitResumeTest => {
                let succeeded = reply.is_positive_completion();
                self.record_resume_bug_result(succeeded);
                if !succeeded {
                    return StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::CRITICALERROR);
                }
                self.begin_transfer()
            }
            State::AwaitTransferStart => {
                if reply.is_preliminary() {
                    self.state = State::AwaitTransferComplete;
                    StepOutcome::Pending
                } else if reply.is_positive_completion() {
                    self.after_transfer()
                } else {
                    StepOutcome::Complete(ReplyCode::ERROR)
                }
            }
            State::AwaitTransferComplete => {
                if reply.is_positive_completion() {
                    self.after_transfer()
                } else {
                    StepOutcome::Complete(ReplyCode::ERROR)
                }
            }
            State::AwaitMfmt => self.finish(),
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        if self.state == State::AwaitChangeDir {
            if !reply.is_success() {
                return StepOutcome::Complete(reply);
            }
            return self.consult_cache_then_proceed();
        }
        StepOutcome::Complete(reply)
    }

    fn on_async_answer(&mut self, answer: ExistsAction) -> StepOutcome<FtpReply> {
        if self.state != State::AwaitOverwriteAnswer {
            return StepOutcome::Complete(ReplyCode::ERROR | ReplyCode::INTERNALERROR);
        }
        match answer {
            ExistsAction::Skip => StepOutcome::Complete(ReplyCode::OK),
            _ => self.begin_resume_test(),
        }
    }
}

impl TransferOperation {
    /// After a successful data transfer: upload path may still need
    /// `MFMT`; download path (and upload when not preserving timestamps)
    /// finishes immediately.
    fn after_transfer(&mut self) -> StepOutcome<FtpReply> {
        if self.spec.direction == TransferDirection::Upload
            && self.config.preserve_timestamps()
            && self
                .capabilities
                .lock()
                .unwrap()
                .get(&self.server, CapabilityName::MfmtCommand)
                .is_supported()
        {
            if let Some(mtime) = self.local_mtime {
                self.state = State::AwaitMfmt;
                return StepOutcome::Send(format!(
                    "MFMT {} {}",
                    format_mfmt_timestamp(mtime, self.server.timezone_offset_minutes.unwrap_or(0)),
                    self.target()
                ));
            }
        }
        self.finish()
    }
}

fn format_mfmt_timestamp(time: SystemTime, timezone_offset_minutes: i32) -> String {
    let adjusted = time
        .checked_sub(std::time::Duration::from_secs((timezone_offset_minutes.max(0) as u64) * 60))
        .unwrap_or(time);
    let secs = adjusted
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::{Encoding, LogonType, Protocol, ServerPath};

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

    fn spec(direction: TransferDirection, resume: Option<u64>) -> TransferSpec {
        TransferSpec {
            direction,
            local_path: "/tmp/f".into(),
            remote_path: ServerPath::parse_unix("/x"),
            remote_file: "f".into(),
            exists_action: ExistsAction::Overwrite,
            resume_offset: resume,
            ascii_mode: false,
        }
    }

    fn op(direction: TransferDirection, resume: Option<u64>) -> TransferOperation {
        TransferOperation::new(
            server(),
            spec(direction, resume),
            Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60)))),
            Arc::new(Mutex::new(CapabilityRegistry::new())),
            Arc::new(Mutex::new(cache::PathCache::new())),
            Arc::new(xfer_core::options::StaticConfig::default()),
        )
    }

    fn drive_past_change_dir(op: &mut TransferOperation) {
        match op.start() {
            StepOutcome::PushChild(_) => {}
            _ => panic!("expected a change-dir child to be pushed"),
        }
    }

    #[test]
    fn plain_download_pushes_change_dir_then_probes_size() {
        let mut op = op(TransferDirection::Download, None);
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "SIZE /x/f"),
            _ => panic!("expected SIZE after a successful change-dir"),
        }
    }

    #[test]
    fn failed_change_dir_aborts_the_whole_transfer() {
        let mut op = op(TransferDirection::Download, None);
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::ERROR) {
            StepOutcome::Complete(reply) => assert!(!reply.is_success()),
            _ => panic!(),
        }
    }

    #[test]
    fn size_reply_feeds_straight_into_the_transfer_command() {
        let mut op = op(TransferDirection::Download, None);
        drive_past_change_dir(&mut op);
        op.on_child_complete(ReplyCode::OK);
        match op.on_event(&FtpReply::new(213, "213 1024")) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "RETR /x/f"),
            _ => panic!(),
        }
        assert_eq!(op.remote_size, Some(1024));
    }

    #[test]
    fn ask_on_a_known_existing_file_raises_an_async_request() {
        let mut s = spec(TransferDirection::Download, None);
        s.exists_action = ExistsAction::Ask;
        let mut op = TransferOperation::new(
            server(),
            s,
            Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60)))),
            Arc::new(Mutex::new(CapabilityRegistry::new())),
            Arc::new(Mutex::new(cache::PathCache::new())),
            Arc::new(xfer_core::options::StaticConfig::default()),
        );
        drive_past_change_dir(&mut op);
        op.on_child_complete(ReplyCode::OK);
        match op.on_event(&FtpReply::new(213, "213 1024")) {
            StepOutcome::AsyncRequest(AsyncRequest::FileExists { remote_size, .. }) => {
                assert_eq!(remote_size, Some(1024));
            }
            _ => panic!("expected an overwrite-confirmation async request"),
        }
        match op.on_async_answer(ExistsAction::Skip) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
    }

    #[test]
    fn resume_bug_unknown_and_remote_larger_probes_with_a_retr() {
        let mut op = op(TransferDirection::Download, Some(RESUME_BUG_4GB + 10));
        op.remote_size = Some(RESUME_BUG_4GB + 20);
        match op.begin_resume_test() {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "RETR /x/f"),
            _ => panic!("expected a resume-test RETR"),
        }
    }

    #[test]
    fn resume_bug_known_present_and_sizes_match_ends_the_transfer_ok() {
        let mut op = op(TransferDirection::Download, Some(RESUME_BUG_4GB + 10));
        op.capabilities.lock().unwrap().set(&server(), CapabilityName::Resume4gbBug, Capability::Yes);
        op.remote_size = Some(RESUME_BUG_4GB + 10);
        match op.begin_resume_test() {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
    }

    #[test]
    fn failed_resume_test_records_the_bug_and_fails_critically() {
        let mut op = op(TransferDirection::Download, Some(RESUME_BUG_4GB + 10));
        op.remote_size = Some(RESUME_BUG_4GB + 20);
        op.begin_resume_test();
        match op.on_event(&FtpReply::new(426, "connection closed")) {
            StepOutcome::Complete(reply) => {
                assert!(!reply.is_success());
                assert!(reply.contains(ReplyCode::CRITICALERROR));
            }
            _ => panic!(),
        }
        assert_eq!(
            op.capabilities.lock().unwrap().get(&server(), CapabilityName::Resume4gbBug),
            Capability::Yes
        );
    }

    #[test]
    fn appending_upload_uses_appe() {
        let mut op = op(TransferDirection::Upload, Some(50));
        drive_past_change_dir(&mut op);
        op.on_child_complete(ReplyCode::OK);
        match op.on_event(&FtpReply::new(213, "213 50")) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "APPE /x/f"),
            _ => panic!(),
        }
    }

    #[test]
    fn upload_to_a_missing_directory_creates_it_via_the_change_dir_child() {
        use crate::op::{Drive, OperationStack};

        let mut stack: OperationStack<FtpReply> = OperationStack::new();
        match stack.push_root(Box::new(op(TransferDirection::Upload, None))) {
            Drive::Send(cmd) => assert_eq!(cmd, "CWD /x"),
            _ => panic!("expected the change-dir child's CWD"),
        }
        // CWD fails; since this is an upload, the child pushes its own
        // Mkdir grandchild rather than failing the whole transfer.
        match stack.on_event(&FtpReply::new(550, "no such directory")).unwrap() {
            Drive::Send(cmd) => assert_eq!(cmd, "MKD /x"),
            _ => panic!("expected a Mkdir sub-op for the missing directory"),
        }
        match stack.on_event(&FtpReply::new(257, "created")).unwrap() {
            Drive::Send(cmd) => assert_eq!(cmd, "CWD /x"),
            _ => panic!("expected CWD to be retried after Mkdir succeeds"),
        }
        match stack.on_event(&FtpReply::new(250, "directory changed")).unwrap() {
            Drive::Send(cmd) => assert_eq!(cmd, "PWD"),
            _ => panic!(),
        }
        match stack.on_event(&FtpReply::new(257, "\"/x\" is current directory")).unwrap() {
            Drive::Send(cmd) => assert_eq!(cmd, "SIZE /x/f"),
            _ => panic!("expected the transfer to resume probing SIZE once the directory exists"),
        }
    }
}
