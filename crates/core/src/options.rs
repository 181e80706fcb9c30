//! The configuration oracle (spec §6): every tunable the engine consults,
//! expressed as a trait so a host can back it with live, mutable settings
//! rather than a frozen snapshot.

use std::time::Duration;

use logging::VerbosityConfig;

/// Read-only view over every engine tunable. Implementations may be
/// backed by a static struct (see [`StaticConfig`]) or by a live settings
/// store the host mutates at runtime; the engine never assumes the
/// returned values are stable across calls.
pub trait ConfigOracle: Send + Sync {
    /// Verbosity configuration forwarded to [`logging`].
    fn verbosity(&self) -> VerbosityConfig;

    /// Directory-cache time-to-live. Clamped by the cache itself to
    /// `[30s, 24h]` regardless of what is returned here.
    fn directory_cache_ttl(&self) -> Duration;

    /// Maximum simultaneous transfers the scheduler may run across all
    /// servers.
    fn max_simultaneous_transfers(&self) -> u32;

    /// Per-server connection cap used when a [`crate::server::Server`]
    /// itself specifies `0` (unlimited).
    fn default_max_connections_per_server(&self) -> u32;

    /// Idle time after which an unused engine is disconnected by the
    /// scheduler (spec §4.6).
    fn idle_disconnect_timeout(&self) -> Duration;

    /// Reconnect back-off schedule: the Nth reconnect attempt (0-indexed)
    /// waits this long before retrying.
    fn reconnect_backoff(&self, attempt: u32) -> Duration;

    /// Maximum reconnect attempts before giving up, surfacing
    /// `ReplyCode::CRITICALERROR` to the host.
    fn max_reconnect_attempts(&self) -> u32;

    /// Token-bucket rate limit in bytes/second for the given direction,
    /// or `None` for unlimited.
    fn rate_limit(&self, direction: crate::command::TransferDirection) -> Option<u64>;

    /// Paths to try, in order, as SFTP private keys when a server has no
    /// explicit keyfile set.
    fn sftp_keyfiles(&self) -> &[String];

    /// Whether a successful queue-completion should offer to reboot,
    /// shutdown, or sleep the host, and the grace period (spec §4.6,
    /// "15s user-cancellable warning").
    fn action_after_queue_warning(&self) -> Duration;

    /// Maximum number of concurrent downloads the scheduler may dispatch
    /// across all servers, independent of `max_simultaneous_transfers`;
    /// `None` means no direction-specific cap (spec §4.6 step 2).
    fn concurrent_download_limit(&self) -> Option<u32>;

    /// Maximum number of concurrent uploads, the upload counterpart of
    /// [`ConfigOracle::concurrent_download_limit`].
    fn concurrent_upload_limit(&self) -> Option<u32>;

    /// Whether a successful transfer should set the remote/local file's
    /// modification time to match its counterpart (`MFMT` after upload,
    /// local mtime after download).
    fn preserve_timestamps(&self) -> bool;

    /// Whether directory listings should include dotfiles.
    fn list_hidden_files(&self) -> bool;
}

/// A plain-data [`ConfigOracle`] implementation, deserializable from a
/// configuration file the way `oferchen-rsync`'s daemon/cli configuration
/// structs are.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StaticConfig {
    pub debug_level: u8,
    pub raw_listing: bool,
    pub detailed_logging: bool,
    pub directory_cache_ttl_secs: u64,
    pub max_simultaneous_transfers: u32,
    pub default_max_connections_per_server: u32,
    pub idle_disconnect_timeout_secs: u64,
    /// Reconnect back-off in seconds, one entry per attempt; the last
    /// entry repeats for any attempt beyond the list's length.
    pub reconnect_backoff_secs: Vec<u64>,
    pub max_reconnect_attempts: u32,
    pub download_rate_limit_bytes_per_sec: Option<u64>,
    pub upload_rate_limit_bytes_per_sec: Option<u64>,
    pub sftp_keyfiles: Vec<String>,
    pub action_after_queue_warning_secs: u64,
    pub concurrent_download_limit: Option<u32>,
    pub concurrent_upload_limit: Option<u32>,
    pub preserve_timestamps: bool,
    pub list_hidden_files: bool,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            debug_level: 0,
            raw_listing: false,
            detailed_logging: false,
            directory_cache_ttl_secs: 600,
            max_simultaneous_transfers: 2,
            default_max_connections_per_server: 1,
            idle_disconnect_timeout_secs: 60,
            reconnect_backoff_secs: vec![1, 2, 5, 10, 30, 60],
            max_reconnect_attempts: 6,
            download_rate_limit_bytes_per_sec: None,
            upload_rate_limit_bytes_per_sec: None,
            sftp_keyfiles: Vec::new(),
            action_after_queue_warning_secs: 15,
            concurrent_download_limit: None,
            concurrent_upload_limit: None,
            preserve_timestamps: true,
            list_hidden_files: true,
        }
    }
}

impl ConfigOracle for StaticConfig {
    fn verbosity(&self) -> VerbosityConfig {
        VerbosityConfig::new(self.debug_level, self.raw_listing, self.detailed_logging)
    }

    fn directory_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.directory_cache_ttl_secs)
    }

    fn max_simultaneous_transfers(&self) -> u32 {
        self.max_simultaneous_transfers
    }

    fn default_max_connections_per_server(&self) -> u32 {
        self.default_max_connections_per_server
    }

    fn idle_disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_disconnect_timeout_secs)
    }

    fn reconnect_backoff(&self, attempt: u32) -> Duration {
        let secs = self
            .reconnect_backoff_secs
            .get(attempt as usize)
            .or_else(|| self.reconnect_backoff_secs.last())
            .copied()
            .unwrap_or(60);
        Duration::from_secs(secs)
    }

    fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    fn rate_limit(&self, direction: crate::command::TransferDirection) -> Option<u64> {
        match direction {
            crate::command::TransferDirection::Download => self.download_rate_limit_bytes_per_sec,
            crate::command::TransferDirection::Upload => self.upload_rate_limit_bytes_per_sec,
        }
    }

    fn sftp_keyfiles(&self) -> &[String] {
        &self.sftp_keyfiles
    }

    fn action_after_queue_warning(&self) -> Duration {
        Duration::from_secs(self.action_after_queue_warning_secs)
    }

    fn concurrent_download_limit(&self) -> Option<u32> {
        self.concurrent_download_limit
    }

    fn concurrent_upload_limit(&self) -> Option<u32> {
        self.concurrent_upload_limit
    }

    fn preserve_timestamps(&self) -> bool {
        self.preserve_timestamps
    }

    fn list_hidden_files(&self) -> bool {
        self.list_hidden_files
    }
}
