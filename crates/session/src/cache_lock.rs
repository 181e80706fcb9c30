//! The cache-lock mechanism (spec §4.4): serializes conflicting protocol
//! commands across engines sharing the same server by letting one
//! operation claim a `(server, path, lock-type)` tuple while it runs.

use std::collections::HashSet;

use xfer_core::server::{Server, ServerPath};

/// The closed set of operations that need mutual exclusion against a
/// concurrent peer touching the same remote path from another session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    /// A directory listing in progress; a second `LIST`/`MLSD` against
    /// the same directory waits rather than racing the first.
    List,
    /// A directory-creation attempt in progress.
    Mkdir,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LockKey {
    server: Server,
    path: ServerPath,
    lock_type: LockType,
}

/// Tracks which `(server, path, lock-type)` tuples are currently held.
/// Locks are released explicitly when the operation that took them pops
/// off the stack; this registry has no timeout of its own.
#[derive(Default)]
pub struct CacheLockRegistry {
    held: HashSet<LockKey>,
}

impl CacheLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to claim the lock, returning `true` if it was free and is
    /// now held by the caller. Returns `false` without side effects if
    /// another operation already holds it.
    pub fn try_acquire(&mut self, server: &Server, path: &ServerPath, lock_type: LockType) -> bool {
        let key = LockKey {
            server: server.clone(),
            path: path.clone(),
            lock_type,
        };
        if self.held.contains(&key) {
            return false;
        }
        self.held.insert(key);
        true
    }

    /// Releases a previously acquired lock. A no-op if it wasn't held,
    /// so a caller that never got the lock can release unconditionally.
    pub fn release(&mut self, server: &Server, path: &ServerPath, lock_type: LockType) {
        self.held.remove(&LockKey {
            server: server.clone(),
            path: path.clone(),
            lock_type,
        });
    }

    pub fn is_locked(&self, server: &Server, path: &ServerPath, lock_type: LockType) -> bool {
        self.held.contains(&LockKey {
            server: server.clone(),
            path: path.clone(),
            lock_type,
        })
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

    #[test]
    fn second_acquire_fails_while_first_holds_it() {
        let mut locks = CacheLockRegistry::new();
        let s = server();
        let path = ServerPath::parse_unix("/x");
        assert!(locks.try_acquire(&s, &path, LockType::List));
        assert!(!locks.try_acquire(&s, &path, LockType::List));
    }

    #[test]
    fn different_lock_types_on_the_same_path_are_independent() {
        let mut locks = CacheLockRegistry::new();
        let s = server();
        let path = ServerPath::parse_unix("/x");
        assert!(locks.try_acquire(&s, &path, LockType::List));
        assert!(locks.try_acquire(&s, &path, LockType::Mkdir));
    }

    #[test]
    fn release_frees_the_lock_for_the_next_acquirer() {
        let mut locks = CacheLockRegistry::new();
        let s = server();
        let path = ServerPath::parse_unix("/x");
        locks.try_acquire(&s, &path, LockType::List);
        locks.release(&s, &path, LockType::List);
        assert!(!locks.is_locked(&s, &path, LockType::List));
        assert!(locks.try_acquire(&s, &path, LockType::List));
    }
}
