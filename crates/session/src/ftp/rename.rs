//! The `RNFR`/`RNTO` operation (spec §4.4.3).

use std::sync::{Arc, Mutex};
use std::time::Instant;

use cache::{DirectoryCache, PathCache};
use xfer_core::reply::ReplyCode;
use xfer_core::server::{Server, ServerPath};

use crate::op::{Operation, StepOutcome};

use super::FtpReply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitRnfr,
    AwaitRnto,
}

pub struct RenameOperation {
    server: Server,
    from_path: ServerPath,
    from_file: String,
    to_path: ServerPath,
    to_file: String,
    directory_cache: Arc<Mutex<DirectoryCache>>,
    path_cache: Arc<Mutex<PathCache>>,
    state: State,
}

impl RenameOperation {
    pub fn new(
        server: Server,
        from_path: ServerPath,
        from_file: String,
        to_path: ServerPath,
        to_file: String,
        directory_cache: Arc<Mutex<DirectoryCache>>,
        path_cache: Arc<Mutex<PathCache>>,
    ) -> Self {
        Self {
            server,
            from_path,
            from_file,
            to_path,
            to_file,
            directory_cache,
            path_cache,
            state: State::AwaitRnfr,
        }
    }
}

impl Operation for RenameOperation {
    type Event = FtpReply;

    fn name(&self) -> &'static str {
        "ftp::rename"
    }

    fn state(&self) -> u32 {
        self.state as u32
    }

    fn start(&mut self) -> StepOutcome<FtpReply> {
        StepOutcome::Send(format!(
            "RNFR {}",
            self.from_path.format_filename(&self.from_file, false)
        ))
    }

    fn on_event(&mut self, reply: &FtpReply) -> StepOutcome<FtpReply> {
        match self.state {
            State::AwaitRnfr => {
                if !reply.is_intermediate() && !reply.is_positive_completion() {
                    return StepOutcome::Complete(ReplyCode::ERROR);
                }
                self.state = State::AwaitRnto;
                StepOutcome::Send(format!(
                    "RNTO {}",
                    self.to_path.format_filename(&self.to_file, false)
                ))
            }
            State::AwaitRnto => {
                if reply.is_positive_completion() {
                    self.apply_to_caches();
                    StepOutcome::Complete(ReplyCode::OK)
                } else {
                    StepOutcome::Complete(ReplyCode::ERROR)
                }
            }
        }
    }

    fn on_child_complete(&mut self, reply: ReplyCode) -> StepOutcome<FtpReply> {
        StepOutcome::Complete(reply)
    }
}

impl RenameOperation {
    /// Applies a successful `RNFR`/`RNTO` to both caches (spec §4.1/§9,
    /// Open Question #1). If the source entry was cached, the rename is
    /// narrow: the directory cache moves the one entry (dropping its own
    /// subtree if it was a directory) rather than discarding either
    /// directory's whole listing. If the source wasn't cached, there is
    /// nothing to move narrowly and the destination's believed state is
    /// unknown, so the whole server's directory cache is dropped instead
    /// of risking a stale entry surviving under the new name. The path
    /// cache has no notion of "cached or not" for a single file and is
    /// always narrowed to the renamed path and its descendants.
    fn apply_to_caches(&mut self) {
        let now = Instant::now();
        let cached_source = self
            .directory_cache
            .lock()
            .unwrap()
            .lookup_file(&self.server, &self.from_path, &self.from_file, now);
        match cached_source {
            Some(entry) => {
                self.directory_cache.lock().unwrap().rename(
                    &self.server,
                    &self.from_path,
                    &self.from_file,
                    &self.to_path,
                    &self.to_file,
                    entry,
                );
            }
            None => {
                self.directory_cache.lock().unwrap().invalidate_server(&self.server);
            }
        }
        let old_full = self.from_path.add_segment(&self.from_file);
        let new_full = self.to_path.add_segment(&self.to_file);
        self.path_cache.lock().unwrap().invalidate_path(&self.server, &old_full, "");
        self.path_cache.lock().unwrap().invalidate_path(&self.server, &new_full, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::server::{Encoding, LogonType, Protocol};

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

    fn caches() -> (Arc<Mutex<DirectoryCache>>, Arc<Mutex<PathCache>>) {
        (
            Arc::new(Mutex::new(DirectoryCache::new(std::time::Duration::from_secs(60)))),
            Arc::new(Mutex::new(PathCache::new())),
        )
    }

    #[test]
    fn full_round_trip_completes_successfully() {
        let (dcache, pcache) = caches();
        let mut op = RenameOperation::new(
            server(),
            ServerPath::parse_unix("/a"),
            "old".into(),
            ServerPath::parse_unix("/a"),
            "new".into(),
            dcache,
            pcache,
        );
        match op.start() {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "RNFR /a/old"),
            _ => panic!(),
        }
        match op.on_event(&FtpReply::new(350, "ready for RNTO")) {
            StepOutcome::Send(cmd) => assert_eq!(cmd, "RNTO /a/new"),
            _ => panic!(),
        }
        match op.on_event(&FtpReply::new(250, "renamed")) {
            StepOutcome::Complete(reply) => assert!(reply.is_success()),
            _ => panic!(),
        }
    }

    #[test]
    fn cached_source_is_moved_narrowly_in_the_directory_cache() {
        use xfer_core::direntry::{DirEntry, DirectoryListing, EntryFlags};

        let (dcache, pcache) = caches();
        let now = Instant::now();
        let src = ServerPath::parse_unix("/a");
        let dst = ServerPath::parse_unix("/b");
        {
            let mut d = dcache.lock().unwrap();
            d.store(
                &server(),
                &src,
                DirectoryListing::new(
                    vec![DirEntry {
                        name: "old".into(),
                        size: 1,
                        modified: None,
                        link_target: None,
                        flags: EntryFlags::empty(),
                        permissions: None,
                    }],
                    now,
                ),
                now,
            );
            d.store(&server(), &dst, DirectoryListing::new(vec![], now), now);
        }
        let mut op = RenameOperation::new(
            server(),
            src.clone(),
            "old".into(),
            dst.clone(),
            "new".into(),
            dcache.clone(),
            pcache,
        );
        op.start();
        op.on_event(&FtpReply::new(350, "ready for RNTO"));
        op.on_event(&FtpReply::new(250, "renamed"));

        let mut d = dcache.lock().unwrap();
        assert!(d.lookup_file(&server(), &src, "old", now).is_none());
        assert!(d.lookup_file(&server(), &dst, "new", now).is_some());
    }

    #[test]
    fn uncached_source_falls_back_to_invalidating_the_whole_server() {
        use xfer_core::direntry::DirectoryListing;

        let (dcache, pcache) = caches();
        let now = Instant::now();
        let untouched = ServerPath::parse_unix("/unrelated");
        dcache
            .lock()
            .unwrap()
            .store(&server(), &untouched, DirectoryListing::new(vec![], now), now);

        let mut op = RenameOperation::new(
            server(),
            ServerPath::parse_unix("/a"),
            "old".into(),
            ServerPath::parse_unix("/b"),
            "new".into(),
            dcache.clone(),
            pcache,
        );
        op.start();
        op.on_event(&FtpReply::new(350, "ready for RNTO"));
        op.on_event(&FtpReply::new(250, "renamed"));

        assert!(dcache.lock().unwrap().lookup(&server(), &untouched, now).is_none());
    }

    #[test]
    fn rnfr_failure_aborts_before_rnto() {
        let (dcache, pcache) = caches();
        let mut op = RenameOperation::new(
            server(),
            ServerPath::parse_unix("/a"),
            "missing".into(),
            ServerPath::parse_unix("/a"),
            "new".into(),
            dcache,
            pcache,
        );
        op.start();
        match op.on_event(&FtpReply::new(550, "no such file")) {
            StepOutcome::Complete(reply) => assert!(!reply.is_success()),
            _ => panic!(),
        }
    }
}
