//! Directory entries and listings (spec §3, "Directory entry" /
//! "Directory listing").

use std::time::SystemTime;

bitflags::bitflags! {
    /// Per-entry metadata flags. Kept as a bitset rather than a handful of
    /// `bool` fields so [`DirEntry`] stays small and the flags can be
    /// combined in tests the way upstream combines the equivalent C++
    /// bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u16 {
        /// Entry is itself a directory.
        const DIR = 1 << 0;
        /// Entry is a symbolic link.
        const LINK = 1 << 1;
        /// A symlink whose target could not be resolved, or that points
        /// outside any directory (broken or dangling).
        const UNSURE_LINK_TARGET_DIR = 1 << 2;
        /// Entry name starts with `.` (hidden on Unix-like servers).
        const HIDDEN = 1 << 3;
        /// Size is unknown (directories, some special files).
        const SIZE_UNKNOWN = 1 << 4;
        /// This entry's own metadata (not just a link target) is suspect,
        /// e.g. synthesized after a targeted per-file cache update rather
        /// than learned from a full listing.
        const UNSURE = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Per-listing flags describing how much a cached
    /// [`DirectoryListing`] can be trusted (spec §3, "Directory
    /// listing"/"unsure flags"). A fresh `LIST`/`MLSD` reply produces an
    /// empty set; the flags accumulate as later per-file cache
    /// operations (`update_file`/`remove_file`/...) patch the listing in
    /// place instead of re-fetching it, so a reader can tell a
    /// synthesized listing from one that came straight off the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ListingFlags: u16 {
        /// A file may have been added since this listing was fetched.
        const UNSURE_FILE_ADDED = 1 << 0;
        /// A file may have been removed since this listing was fetched.
        const UNSURE_FILE_REMOVED = 1 << 1;
        /// A file's metadata may be stale.
        const UNSURE_FILE_CHANGED = 1 << 2;
        /// A directory may have been added since this listing was fetched.
        const UNSURE_DIR_ADDED = 1 << 3;
        /// A directory may have been removed since this listing was
        /// fetched.
        const UNSURE_DIR_REMOVED = 1 << 4;
        /// A directory's metadata may be stale.
        const UNSURE_DIR_CHANGED = 1 << 5;
        /// The listing as a whole can no longer be trusted and should be
        /// treated as a cache miss on next lookup.
        const UNSURE_INVALID = 1 << 6;
        /// Some entries were touched by an operation whose outcome on
        /// this directory isn't fully known.
        const UNSURE_UNKNOWN = 1 << 7;
        /// At least one entry in this listing is a directory.
        const HAS_DIRS = 1 << 8;
        /// Entries carry permission information.
        const HAS_PERMS = 1 << 9;
        /// Entries carry owner/group information.
        const HAS_USERGROUP = 1 << 10;
    }
}

impl ListingFlags {
    /// Any of the "unsure" bits being set means the listing should not
    /// be handed out as-is without a caller explicitly opting in (e.g.
    /// `DirectoryCache::lookup` treats [`ListingFlags::UNSURE_INVALID`]
    /// as a forced miss).
    const UNSURE_MASK: ListingFlags = ListingFlags::UNSURE_FILE_ADDED
        .union(ListingFlags::UNSURE_FILE_REMOVED)
        .union(ListingFlags::UNSURE_FILE_CHANGED)
        .union(ListingFlags::UNSURE_DIR_ADDED)
        .union(ListingFlags::UNSURE_DIR_REMOVED)
        .union(ListingFlags::UNSURE_DIR_CHANGED)
        .union(ListingFlags::UNSURE_INVALID)
        .union(ListingFlags::UNSURE_UNKNOWN);

    pub fn is_unsure(self) -> bool {
        self.intersects(Self::UNSURE_MASK)
    }
}

/// A single parsed row of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    /// The raw filename as the server reports it (not a full path).
    pub name: String,
    /// Size in bytes, meaningless when [`EntryFlags::SIZE_UNKNOWN`] is set.
    pub size: u64,
    /// Last-modified time, if the server supplied one.
    pub modified: Option<SystemTime>,
    /// If this is a link, the target path text as reported (unresolved).
    pub link_target: Option<String>,
    pub flags: EntryFlags,
    /// Raw owner/permission string as received, kept opaque since its
    /// format is entirely server/protocol dependent.
    pub permissions: Option<String>,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.flags.contains(EntryFlags::DIR)
    }

    pub fn is_link(&self) -> bool {
        self.flags.contains(EntryFlags::LINK)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(EntryFlags::HIDDEN)
            || self.name.starts_with('.') && self.name != "." && self.name != ".."
    }

    /// Whether this entry refers to itself or its parent (`.`/`..`), which
    /// upstream filters out of cached listings.
    pub fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// Whether this entry's own metadata is suspect, either because the
    /// entry is flagged directly or its link target couldn't be resolved.
    pub fn is_unsure(&self) -> bool {
        self.flags.intersects(EntryFlags::UNSURE | EntryFlags::UNSURE_LINK_TARGET_DIR)
    }
}

/// A full listing of one remote directory, as cached by
/// `crates::cache::DirectoryCache`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectoryListing {
    pub entries: Vec<DirEntry>,
    /// When this listing was fetched, used for TTL expiry.
    pub fetched_at: Option<SystemTime>,
    /// Unsure/trust bits accumulated by per-file cache patches since this
    /// listing was last fetched wholesale.
    pub flags: ListingFlags,
}

impl DirectoryListing {
    pub fn new(entries: Vec<DirEntry>, fetched_at: SystemTime) -> Self {
        let mut flags = ListingFlags::empty();
        if entries.iter().any(DirEntry::is_dir) {
            flags |= ListingFlags::HAS_DIRS;
        }
        if entries.iter().any(|e| e.permissions.is_some()) {
            flags |= ListingFlags::HAS_PERMS;
        }
        Self {
            entries,
            fetched_at: Some(fetched_at),
            flags,
        }
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut DirEntry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this listing should be treated as a forced cache miss
    /// rather than handed out as-is.
    pub fn is_invalid(&self) -> bool {
        self.flags.contains(ListingFlags::UNSURE_INVALID)
    }
}
