//! The `LIST`/`MLSD` operation (spec §4.4.2), grounded on upstream's
//! `CFtpListOpData`/`ftp/list.cpp`.

use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};

use cache::capabilities::{Capability, CapabilityName, CapabilityRegistry};
use cache::{DirectoryCache, PathCache};
use xfer_core::direntry::DirectoryListing;
use xfer_core::options::ConfigOracle;
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::cache_lock::{CacheLockRegistry, LockType};
use crate::op::{Operation, StepOutcome};

use super::change_dir::ChangeDirOperation;
use super::mdtm::parse_mdtm_reply;
use super::{FtpReply, ListingParser};

/// Exact, case-sensitive-except-where-noted strings `ftp/list.cpp`'s
/// `IsMisleadingListResponse` treats as "the directory is empty" rather
/// than an error, even though they arrive on a failure reply code.
const MISLEADING_EMPTY_REPLIES: &[&str] = &[
    "550 No members found.",
    "550 No data sets found.",
];

fn is_misleading_empty_reply(line: &str) -> bool {
    MISLEADING_EMPTY_REPLIES.contains(&line) || line.eq_ignore_ascii_case("550 no files found.")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    AwaitChangeDir,
    AwaitTransferReply,
    AwaitMdtm,
}

/// Lists one remote directory: `init -> waitcwd -> waitlock ->
/// waittransfer -> (mdtm)`. `waitlock` is not a distinct wait state here
/// since lock acquisition is synchronous; a contended lock completes the
/// whole operation with [`ReplyCode::WOULDBLOCK`] instead, for the
/// caller to retry once the holder releases it.
pub struct ListOperation<P: ListingParser> {
    server: Server,
    path: ServerPath,
    refresh: bool,
    directory_cache: Arc<Mutex<DirectoryCache>>,
    path_cache: Arc<Mutex<PathCache>>,
    capabilities: Arc<Mutex<CapabilityRegistry>>,
    cache_locks: Arc<Mutex<CacheLockRegistry>>,
    config: Arc<dyn ConfigOracle>,
    parser: P,
    state: State,
    raw_lines: Vec<String>,
    listing: Option<DirectoryListing>,
    lock_held: bool,
    used_mlsd: bool,
    /// The listed mtime of the entry an in-flight timezone-derivation
    /// `MDTM` was sent for, to diff against the reply.
    mdtm_probe_reference: Option<SystemTime>,
}

impl<P: ListingParser> ListOperation<P> {
    pub fn new(
        server: Server,
        path: ServerPath,
        refresh: bool,
        directory_cache: Arc<Mutex<DirectoryCache>>,
        path_cache: Arc<Mutex<PathCache>>,
        capabilities: Arc<Mutex<CapabilityRegistry>>,
        cache_locks: Arc<Mutex<CacheLockRegistry>>,
        config: Arc<dyn ConfigOracle>,
        parser: P,
    ) -> Self {
        Self {
            server,
            path,
            refresh,
            directory_cache,
            path_cache,
            capabilities,
            cache_locks,
            config,
            parser,
            state: State::Init,
            raw_lines: Vec::new(),
            listing: None,
            lock_held: false,
            used_mlsd: false,
            mdtm_probe_reference: None,
        }
    }

    pub fn listing(&self) -> Option<&DirectoryListing> {
        self.listing.as_ref()
    }

    /// Called by the session with each raw listing line received while a
    /// data-connection transfer is in progress; these arrive outside the
    /// control-reply stream and are buffered until the transfer-complete
    /// reply closes the operation out.
    pub fn push_raw_line(&mut self, line: String) {
        self.raw_lines.push(line);
    }

    fn cache_lookup(&self) -> Option<DirectoryListing> {
        self.directory_cache.lock().unwrap().lookup(&self.server, &self.path, Instant::now())
    }

    /// After a successful change-dir: a pre-lock cache check honors a
    /// plain (non-refresh) lookup without ever touching the lock; if that
    /// misses (or `refresh` was requested), the lock is acquired and the
    /// cache is checked once more, since another session may have just
    /// populated it while this one waited to get in line for the lock.
    fn consult_cache_then_list(&mut self) -> StepOutcome<FtpReply> {
        if !self.refresh {
            if let Some(listing) = self.cache_lookup() {
                self.listing = Some(listing);
                return StepOutcome::Complete(ReplyCode::OK);
            }
        }
        if !self.cache_locks.lock().unwrap().try_acquire(&self.server, &self.path, LockType::List) {
            return StepOutcome::Complete(ReplyCode::WOULDBLOCK);
        }
        self.lock_held = true;
        if let Some(listing) = self.cache_lookup() {
            self.listing = Some(listing);
            self.release_lock();
            return StepOutcome::Complete(ReplyCode::OK);
        }
        self.send_list_command()
    }

    fn send_list_command(&mut self) -> StepOutcome<FtpReply> {
        self.state = State::AwaitTransferReply;
        let mlsd = self
            .capabilities
            .lock()
            .unwrap()
            .get(&self.server, CapabilityName::MlsdCommand)
            .is_supported();
        self.used_mlsd = mlsd;
        if mlsd {
            return StepOutcome::Send(format!("MLSD {}", self.path));
        }
        let hidden_wanted = self.config.list_hidden_files();
        let hidden_unsupported = self
            .capabilities
            .lock()
            .unwrap()
            .get(&self.server, CapabilityName::ListHiddenSupport)
            == Capability::No;
        if hidden_wanted && !hidden_unsupported {
            StepOutcome::Send(format!("LIST -a {}", self.path))
        } else {
            StepOutcome::Send(format!("LIST {}", self.path))
        }
    }

    fn release_lock(&mut self) {
        if self.lock_held {
            self.cache_locks.lock().unwrap().release(&self.server, &self.path, LockType::List);
            self.lock_held = false;
        }
    }

    fn finish(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        let entries = self.parser.parse(&self.raw_lines);
        let listing = DirectoryListing::new(entries, Instant::now());
        self.directory_cache
            .lock()
            .unwrap()
            .store(&self.server, &self.path, listing.clone(), Instant::now());
        self.listing = Some(listing);
        self.release_lock();
        self.begin_timezone_derivation(reply)
    }

    /// Derives the server's timezone offset (spec §4.3) by comparing a
    /// freshly listed file's reported mtime against the same file's
    /// `MDTM` reply, which is always UTC; only worth doing off a `LIST`
    /// reply (an `MLSD` reply is already UTC) and only once per server.
    fn begin_timezone_derivation(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        if self.used_mlsd || !reply.is_success() {
            return StepOutcome::Complete(reply);
        }
        let known = self.capabilities.lock().unwrap().get(&self.server, CapabilityName::TimezoneOffset).is_known();
        if known {
            return StepOutcome::Complete(reply);
        }
        let candidate = self
            .listing
            .as_ref()
            .and_then(|listing| listing.entries.iter().find(|e| !e.is_dot_entry() && e.modified.is_some()));
        let Some(entry) = candidate else {
            return StepOutcome::Complete(reply);
        };
        self.mdtm_probe_reference = entry.modified;
        let target = self.path.format_filename(&entry.name, false);
        self.state = State::AwaitMdtm;
        StepOutcome::Send(format!("MDTM {target}"))
    }
}

impl<P: ListingParser> Operation for ListOperation<P> {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::list"
    }

    fn state(&self) -> u32 {
        self.state as u32
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        self.state = State::AwaitChangeDir;
        StepOutcome::PushChild(Box::new(ChangeDirOperation::new(
            self.server.clone(),
            self.path.clone(),
            String::new(),
            self.path_cache.clone(),
        )))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        match self.state {
            State::Init | State::AwaitChangeDir => StepOutcome::Pending,
            State::AwaitTransferReply => {
                if reply.is_preliminary() {
                    // 150 "Opening data connection" — keep waiting for the
                    // transfer to finish; raw lines arrive via
                    // `push_raw_line` out of band.
                    StepOutcome::Pending
                } else if reply.is_positive_completion() {
                    self.finish(ReplyCode::OK)
                } else if is_misleading_empty_reply(reply.first_line()) {
                    // Treated as "directory exists and is empty", not a
                    // failure, matching upstream's explicit allowance.
                    self.raw_lines.clear();
                    self.finish(ReplyCode::OK)
                } else {
                    self.release_lock();
                    StepOutcome::Complete(ReplyCode::ERROR)
                }
            }
            State::AwaitMdtm => {
                if reply.is_positive_completion() {
                    if let (Some(mdtm_time), Some(reference)) = (parse_mdtm_reply(reply.first_line()), self.mdtm_probe_reference) {
                        if let Ok(delta) = mdtm_time.duration_since(reference) {
                            let minutes = (delta.as_secs() / 60) as i32;
                            self.capabilities.lock().unwrap().set_timezone_offset(&self.server, minutes);
                        } else if let Ok(delta) = reference.duration_since(mdtm_time) {
                            let minutes = -((delta.as_secs() / 60) as i32);
                            self.capabilities.lock().unwrap().set_timezone_offset(&self.server, minutes);
                        }
                    }
                }
                StepOutcome::Complete(ReplyCode::OK)
            }
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        if self.state == State::AwaitChangeDir {
            if !reply.is_success() {
                return StepOutcome::Complete(reply);
            }
            return self.consult_cache_then_list();
        }
        StepOutcome::Complete(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::{Encoding, LogonType, Protocol};

    struct NullParser;
    impl ListingParser for NullParser {
        fn parse(&self, lines: &[String]) -> Vec<xfer_core::direntry::DirEntry> {
            lines
                .iter()
                .map(|name| xfer_core::direntry::DirEntry {
                    name: name.clone(),
                    size: 0,
                    modified: None,
                    link_target: None,
                    flags: Default::default(),
                    permissions: None,
                })
                .collect()
        }
    }

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

    fn op(path: &str, refresh: bool, directory_cache: Arc<Mutex<DirectoryCache>>) -> ListOperation<NullParser> {
        ListOperation::new(
            server(),
            ServerPath::parse_unix(path),
            refresh,
            directory_cache,
            Arc::new(Mutex::new(PathCache::new())),
            Arc::new(Mutex::new(CapabilityRegistry::new())),
            Arc::new(Mutex::new(CacheLockRegistry::new())),
            Arc::new(xfer_core::options::StaticConfig::default()),
            NullParser,
        )
    }

    fn drive_past_change_dir<P: ListingParser>(op: &mut ListOperation<P>) {
        match op.start() {
            StepOutcome::PushChild(_) => {}
            _ => panic!("expected a change-dir child to be pushed"),
        }
    }

    #[test]
    fn misleading_empty_replies_are_recognized_exactly() {
        assert!(is_misleading_empty_reply("550 No members found."));
        assert!(is_misleading_empty_reply("550 No data sets found."));
        assert!(is_misleading_empty_reply("550 NO FILES FOUND."));
        assert!(!is_misleading_empty_reply("550 Permission denied."));
    }

    #[test]
    fn successful_list_pushes_change_dir_then_sends_list() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let mut op = op("/x", false, cache.clone());
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "LIST /x"),
            _ => panic!("expected LIST after a successful change-dir"),
        }
        op.push_raw_line("a".into());
        op.push_raw_line("b".into());
        match op.on_event(&FtpReply::new(150, "opening data connection")) {
            StepOutcome::Pending => {}
            _ => panic!("expected to keep waiting"),
        }
        match op.on_event(&FtpReply::new(226, "transfer complete")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected completion"),
        }
        assert_eq!(op.listing().unwrap().len(), 2);
        assert!(cache.lock().unwrap().lookup(&server(), &ServerPath::parse_unix("/x"), Instant::now()).is_some());
    }

    #[test]
    fn failed_change_dir_aborts_before_any_lock_is_taken() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let mut op = op("/x", false, cache);
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::ERROR) {
            StepOutcome::Complete(reply) => assert!(!reply.is_success()),
            _ => panic!(),
        }
        assert!(!op.lock_held);
    }

    #[test]
    fn misleading_empty_reply_completes_successfully_with_no_entries() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let mut op = op("/empty", false, cache);
        drive_past_change_dir(&mut op);
        op.on_child_complete(ReplyCode::OK);
        match op.on_event(&FtpReply::new(550, "No members found.")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected misleading-empty reply to succeed"),
        }
        assert_eq!(op.listing().unwrap().len(), 0);
    }

    #[test]
    fn cached_listing_short_circuits_without_acquiring_the_lock() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        cache.lock().unwrap().store(
            &server(),
            &ServerPath::parse_unix("/x"),
            DirectoryListing::new(vec![], Instant::now()),
            Instant::now(),
        );
        let mut op = op("/x", false, cache);
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected cache hit"),
        }
        assert!(!op.lock_held);
    }

    #[test]
    fn refresh_bypasses_the_pre_lock_cache_check() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        cache.lock().unwrap().store(
            &server(),
            &ServerPath::parse_unix("/x"),
            DirectoryListing::new(vec![], Instant::now()),
            Instant::now(),
        );
        let mut op = op("/x", true, cache);
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!("expected the post-lock re-check to still hit the cache"),
        }
    }

    #[test]
    fn contended_lock_completes_with_wouldblock() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let locks = Arc::new(Mutex::new(CacheLockRegistry::new()));
        locks.lock().unwrap().try_acquire(&server(), &ServerPath::parse_unix("/x"), LockType::List);
        let mut op = ListOperation::new(
            server(),
            ServerPath::parse_unix("/x"),
            false,
            cache,
            Arc::new(Mutex::new(PathCache::new())),
            Arc::new(Mutex::new(CapabilityRegistry::new())),
            locks,
            Arc::new(xfer_core::options::StaticConfig::default()),
            NullParser,
        );
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Complete(reply) => assert_eq!(reply, ReplyCode::WOULDBLOCK),
            _ => panic!("expected the contended lock to surface as wouldblock"),
        }
    }

    #[test]
    fn mlsd_is_preferred_once_the_capability_is_known() {
        let cache = Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60))));
        let capabilities = Arc::new(Mutex::new(CapabilityRegistry::new()));
        capabilities.lock().unwrap().set(&server(), CapabilityName::MlsdCommand, Capability::Yes);
        let mut op = ListOperation::new(
            server(),
            ServerPath::parse_unix("/x"),
            false,
            cache,
            Arc::new(Mutex::new(PathCache::new())),
            capabilities,
            Arc::new(Mutex::new(CacheLockRegistry::new())),
            Arc::new(xfer_core::options::StaticConfig::default()),
            NullParser,
        );
        drive_past_change_dir(&mut op);
        match op.on_child_complete(ReplyCode::OK) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "MLSD /x"),
            _ => panic!("expected MLSD to be preferred over LIST"),
        }
    }
}
