//! The path-resolution cache (spec §4.2), grounded on upstream's
//! `CPathCache`: maps a (server, path, subdir) triple to the resolved
//! target path a prior `CWD` reached, so a later `CWD subdir` can skip
//! the round trip entirely.

use rustc_hash::FxHashMap as HashMap;

use xfer_core::server::{Server, ServerPath};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Key {
    server: Server,
    path: ServerPath,
    subdir: String,
}

/// Caches resolved `CWD` targets. Unlike [`crate::directory_cache::DirectoryCache`]
/// this has no TTL and no size cap upstream imposes; entries are removed
/// only by explicit invalidation, since a resolved path mapping does not
/// go stale on its own the way directory contents do.
#[derive(Default)]
pub struct PathCache {
    entries: HashMap<Key, ServerPath>,
    hits: u64,
    misses: u64,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, server: &Server, path: &ServerPath, subdir: &str, target: ServerPath) {
        self.entries.insert(
            Key {
                server: server.clone(),
                path: path.clone(),
                subdir: subdir.to_string(),
            },
            target,
        );
    }

    /// Resolves `subdir` relative to `path` on `server`. Checks the
    /// combined `(path, subdir)` key first; if absent, falls back to
    /// checking whether `path`'s *parent* has a cached mapping for the
    /// same subdir name, matching `cwd_init`'s two-level lookup for the
    /// case where only the parent directory's children were previously
    /// resolved.
    pub fn lookup(&mut self, server: &Server, path: &ServerPath, subdir: &str) -> Option<ServerPath> {
        if let Some(target) = self.entries.get(&Key {
            server: server.clone(),
            path: path.clone(),
            subdir: subdir.to_string(),
        }) {
            self.hits += 1;
            return Some(target.clone());
        }
        if let Some(parent) = path.parent() {
            if let Some(target) = self.entries.get(&Key {
                server: server.clone(),
                path: parent,
                subdir: subdir.to_string(),
            }) {
                self.hits += 1;
                return Some(target.clone());
            }
        }
        self.misses += 1;
        None
    }

    /// Removes every mapping whose source (`path`/`subdir` combined) or
    /// resolved target is equal to, or a descendant of, `path.join(subdir)`
    /// (spec §4.2). Matching only exact equality misses mappings built on
    /// a since-renamed/removed *ancestor* of their source or target, e.g.
    /// a child directory's own cached resolution surviving the rename of
    /// its parent.
    pub fn invalidate_path(&mut self, server: &Server, path: &ServerPath, subdir: &str) {
        let doomed = if subdir.is_empty() {
            path.clone()
        } else {
            path.add_segment(subdir)
        };
        self.entries.retain(|k, target| {
            if &k.server != server {
                return true;
            }
            let source = if k.subdir.is_empty() {
                k.path.clone()
            } else {
                k.path.add_segment(&k.subdir)
            };
            let source_hit = doomed.is_parent_of(&source, true) || source.is_parent_of(&doomed, true);
            let target_hit = doomed.is_parent_of(target, true);
            !(source_hit || target_hit)
        });
    }

    pub fn invalidate_server(&mut self, server: &Server) {
        self.entries.retain(|k, _| &k.server != server);
    }

    /// `(hits, misses)` since construction, for host-side telemetry.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
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
    fn direct_hit_counts_as_hit() {
        let mut cache = PathCache::new();
        let s = server();
        let p = ServerPath::parse_unix("/a");
        cache.store(&s, &p, "b", ServerPath::parse_unix("/a/b"));
        assert_eq!(cache.lookup(&s, &p, "b"), Some(ServerPath::parse_unix("/a/b")));
        assert_eq!(cache.stats(), (1, 0));
    }

    #[test]
    fn miss_falls_back_to_parent_lookup() {
        let mut cache = PathCache::new();
        let s = server();
        let root = ServerPath::parse_unix("/");
        cache.store(&s, &root, "a", ServerPath::parse_unix("/a"));
        let a = ServerPath::parse_unix("/a");
        // No direct mapping for (/a, "a"), but parent of /a is /, which has one.
        assert_eq!(cache.lookup(&s, &a, "a"), Some(ServerPath::parse_unix("/a")));
    }

    #[test]
    fn total_miss_is_recorded_once() {
        let mut cache = PathCache::new();
        let s = server();
        assert!(cache.lookup(&s, &ServerPath::parse_unix("/x"), "y").is_none());
        assert_eq!(cache.stats(), (0, 1));
    }

    #[test]
    fn invalidate_drops_mappings_through_path_as_source_or_target() {
        let mut cache = PathCache::new();
        let s = server();
        let root = ServerPath::parse_unix("/");
        cache.store(&s, &root, "a", ServerPath::parse_unix("/a"));
        cache.invalidate_path(&s, &ServerPath::parse_unix("/a"), "");
        assert_eq!(cache.lookup(&s, &root, "a"), None);
    }

    #[test]
    fn invalidate_path_drops_descendant_target_mappings_too() {
        let mut cache = PathCache::new();
        let s = server();
        cache.store(&s, &ServerPath::parse_unix("/real"), "", ServerPath::parse_unix("/link"));
        cache.store(
            &s,
            &ServerPath::parse_unix("/real/sub"),
            "",
            ServerPath::parse_unix("/link/sub"),
        );
        cache.invalidate_path(&s, &ServerPath::parse_unix("/link"), "");
        assert_eq!(cache.lookup(&s, &ServerPath::parse_unix("/real"), ""), None);
        assert_eq!(cache.lookup(&s, &ServerPath::parse_unix("/real/sub"), ""), None);
    }
}
