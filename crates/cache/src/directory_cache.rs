//! The directory-listing cache (spec §4.1), grounded on upstream's
//! `CDirectoryCache`: an LRU of listings keyed by (server, path), with a
//! TTL clamped to `[30s, 24h]` and size-based eviction that gets stricter
//! as the cache grows.

use std::time::{Duration, Instant};

use logging::Level;
use xfer_core::direntry::{DirEntry, DirectoryListing};
use xfer_core::server::{Server, ServerPath};

use crate::lru::LruList;

const TTL_MIN: Duration = Duration::from_secs(30);
const TTL_MAX: Duration = Duration::from_secs(24 * 60 * 60);

/// Clamps a caller-supplied TTL into `[30s, 24h]`, matching
/// `CDirectoryCache::SetTtl`'s range check.
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.clamp(TTL_MIN, TTL_MAX)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct Key {
    server: Server,
    path: ServerPath,
}

struct Entry {
    listing: DirectoryListing,
    inserted_at: Instant,
}

/// Total number of cached files across all listings is tracked
/// separately from `LruList::len` because eviction pressure in upstream
/// scales with total file *count*, not listing count (a cache of 50
/// listings with 100,000 entries each is much heavier than 50,000
/// one-entry listings).
pub struct DirectoryCache {
    lru: LruList<Key, Entry>,
    total_files: u64,
    ttl: Duration,
}

impl DirectoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            lru: LruList::new(),
            total_files: 0,
            ttl: clamp_ttl(ttl),
        }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = clamp_ttl(ttl);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the cache should evict before admitting one more listing,
    /// per upstream's three size thresholds: more than 50,000 listings
    /// always trips eviction; past one million cached files the ceiling
    /// drops to 1,000 listings; past five million files it drops again to
    /// 100 listings.
    fn over_budget(&self) -> bool {
        self.lru.len() > 50_000
            || (self.total_files > 1_000_000 && self.lru.len() > 1_000)
            || (self.total_files > 5_000_000 && self.lru.len() > 100)
    }

    fn evict_until_within_budget(&mut self) {
        let mut evicted = 0u32;
        while self.over_budget() {
            let Some((_, entry)) = self.lru.pop_back() else {
                break;
            };
            self.total_files = self.total_files.saturating_sub(entry.listing.len() as u64);
            evicted += 1;
        }
        if evicted > 0 {
            logging::log(
                Level::DebugVerbose,
                format!("directory cache evicted {evicted} listing(s), {} remain", self.lru.len()),
            );
        }
    }

    /// Stores a freshly fetched listing, evicting older entries if the
    /// cache is over budget afterward.
    pub fn store(&mut self, server: &Server, path: &ServerPath, listing: DirectoryListing, now: Instant) {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        self.total_files += listing.len() as u64;
        if let Some(old) = self.lru.insert(
            key,
            Entry {
                listing,
                inserted_at: now,
            },
        ) {
            self.total_files = self.total_files.saturating_sub(old.listing.len() as u64);
        }
        self.evict_until_within_budget();
    }

    /// Returns the cached listing if present and unexpired, marking it
    /// most-recently-used. Expired entries are not evicted here; they are
    /// left for [`DirectoryCache::store`]/`invalidate` to reclaim, mirroring
    /// upstream lazily purging stale entries rather than scanning for them.
    pub fn lookup(&mut self, server: &Server, path: &ServerPath, now: Instant) -> Option<&DirectoryListing> {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        let expired = {
            let entry = self.lru.get(&key)?;
            now.saturating_duration_since(entry.inserted_at) > self.ttl
        };
        if expired {
            return None;
        }
        self.lru.touch(&key);
        self.lru.get(&key).map(|e| &e.listing).filter(|l| !l.is_invalid())
    }

    /// Looks up a single cached entry within one directory's listing,
    /// without handing out the whole listing. Returns `None` both when
    /// the directory itself isn't cached and when it is cached but has
    /// no entry by that name — callers that need to tell these apart
    /// should consult [`DirectoryCache::does_exist`] instead.
    pub fn lookup_file(&mut self, server: &Server, path: &ServerPath, file: &str, now: Instant) -> Option<DirEntry> {
        self.lookup(server, path, now)?.find(file).cloned()
    }

    /// Whether `file` exists under `path`, if that directory's listing is
    /// cached; `None` means unknown (the directory isn't cached at all).
    pub fn does_exist(&mut self, server: &Server, path: &ServerPath, file: &str, now: Instant) -> Option<bool> {
        Some(self.lookup(server, path, now)?.find(file).is_some())
    }

    /// The cached last-modified time of one file, if both the directory
    /// and the file's own timestamp are known.
    pub fn get_change_time(
        &mut self,
        server: &Server,
        path: &ServerPath,
        file: &str,
        now: Instant,
    ) -> Option<std::time::SystemTime> {
        self.lookup(server, path, now)?.find(file).and_then(|e| e.modified)
    }

    /// Marks one cached entry's metadata as suspect without evicting it,
    /// used when an operation changes a file in a way whose exact result
    /// on that entry isn't known (e.g. a `CHMOD` whose reply doesn't echo
    /// the new permission string).
    pub fn invalidate_file(&mut self, server: &Server, path: &ServerPath, file: &str) {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        if let Some(entry) = self.lru.get_mut(&key) {
            if let Some(e) = entry.listing.find_mut(file) {
                e.flags |= xfer_core::direntry::EntryFlags::UNSURE;
            }
            entry.listing.flags |= xfer_core::direntry::ListingFlags::UNSURE_FILE_CHANGED;
        }
    }

    /// Inserts or replaces one entry in a cached listing, without
    /// touching the rest of it. A no-op if the listing itself isn't
    /// cached, since there is nothing to patch.
    pub fn update_file(&mut self, server: &Server, path: &ServerPath, entry: DirEntry) {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        if let Some(e) = self.lru.get_mut(&key) {
            if let Some(existing) = e.listing.find_mut(&entry.name) {
                *existing = entry;
            } else {
                e.listing.entries.push(entry);
                self.total_files += 1;
            }
        }
    }

    /// Removes one entry from a cached listing in place, without
    /// evicting the whole listing. A no-op if the listing isn't cached.
    pub fn remove_file(&mut self, server: &Server, path: &ServerPath, file: &str) {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        if let Some(e) = self.lru.get_mut(&key) {
            if let Some(pos) = e.listing.entries.iter().position(|en| en.name == file) {
                e.listing.entries.remove(pos);
                self.total_files = self.total_files.saturating_sub(1);
            }
        }
    }

    /// Removes a directory entry from its parent's cached listing and
    /// drops its own cached subtree, used after a successful `RMD`.
    pub fn remove_dir(&mut self, server: &Server, path: &ServerPath, dir: &str) {
        self.remove_file(server, path, dir);
        self.invalidate_subtree(server, &path.add_segment(dir));
    }

    /// Applies a successful rename to the cache in place: removes the
    /// old name from its directory's listing and inserts it, renamed,
    /// into the destination directory's listing (the same listing, for
    /// a same-directory rename). If the renamed entry is itself a
    /// directory its own cached subtree is dropped rather than re-keyed
    /// wholesale, since the parent listing already reflects the move
    /// without a round trip.
    pub fn rename(
        &mut self,
        server: &Server,
        from_path: &ServerPath,
        from_file: &str,
        to_path: &ServerPath,
        to_file: &str,
        mut entry: DirEntry,
    ) {
        self.remove_file(server, from_path, from_file);
        entry.name = to_file.to_string();
        let is_dir = entry.is_dir();
        self.update_file(server, to_path, entry);
        if is_dir {
            self.invalidate_subtree(server, &from_path.add_segment(from_file));
        }
    }

    /// Removes one path's cached listing for one server, e.g. after a
    /// mutation (mkdir/delete/rename) that invalidates it directly.
    pub fn invalidate(&mut self, server: &Server, path: &ServerPath) {
        let key = Key {
            server: server.clone(),
            path: path.clone(),
        };
        if let Some(entry) = self.lru.remove(&key) {
            self.total_files = self.total_files.saturating_sub(entry.listing.len() as u64);
        }
    }

    /// Removes every cached listing at or below `path` for one server,
    /// used after a directory rename/remove where descendants' cached
    /// paths would otherwise point at stale locations.
    pub fn invalidate_subtree(&mut self, server: &Server, path: &ServerPath) {
        let doomed: Vec<Key> = self
            .lru
            .iter_keys_mru_first()
            .filter(|k| &k.server == server && path.is_parent_of(&k.path, true))
            .cloned()
            .collect();
        for key in doomed {
            if let Some(entry) = self.lru.remove(&key) {
                self.total_files = self.total_files.saturating_sub(entry.listing.len() as u64);
            }
        }
    }

    /// Drops every cached listing for one server, used on disconnect
    /// since cached paths may no longer correspond to the same content
    /// once the session reconnects (matches upstream invalidating a whole
    /// server's entries on `RemoveServer`).
    pub fn invalidate_server(&mut self, server: &Server) {
        let doomed: Vec<Key> = self
            .lru
            .iter_keys_mru_first()
            .filter(|k| &k.server == server)
            .cloned()
            .collect();
        let count = doomed.len();
        for key in doomed {
            if let Some(entry) = self.lru.remove(&key) {
                self.total_files = self.total_files.saturating_sub(entry.listing.len() as u64);
            }
        }
        if count > 0 {
            logging::log(
                Level::DebugInfo,
                format!("directory cache dropped {count} listing(s) for {}", server.host),
            );
        }
    }

    pub fn listing_count(&self) -> usize {
        self.lru.len()
    }

    pub fn total_files(&self) -> u64 {
        self.total_files
    }
}
