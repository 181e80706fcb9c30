//! The command union (spec §3, "Command") that a session is asked to
//! execute, and identifiers used to track commands through the operation
//! stack and the scheduler.

use crate::server::ServerPath;

/// Uniquely identifies a command within one session's lifetime. Assigned
/// by the caller (engine/scheduler), monotonically increasing, never
/// reused — mirrors the `id` field upstream attaches to every command so a
/// notification can be correlated back to the command that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(pub u64);

/// What to do if the local or remote target of a file transfer already
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExistsAction {
    Ask,
    Overwrite,
    OverwriteIfNewer,
    OverwriteIfSizeDiffers,
    OverwriteIfSizeOrDateDiffers,
    Resume,
    Rename,
    Skip,
}

/// Direction of a file transfer relative to the local host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Download,
    Upload,
}

/// Parameters for a single file transfer, shared by the `FileTransfer`
/// command variant.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSpec {
    pub direction: TransferDirection,
    pub local_path: std::path::PathBuf,
    pub remote_path: ServerPath,
    pub remote_file: String,
    pub exists_action: ExistsAction,
    /// Resume from this many already-transferred bytes, if the transfer
    /// was previously interrupted.
    pub resume_offset: Option<u64>,
    /// ASCII vs binary transfer mode; only meaningful for FTP.
    pub ascii_mode: bool,
}

/// The full set of operations a control session can be asked to perform
/// (spec §3). Each variant corresponds to one top-level [`crate::session`]
/// operation pushed onto that session's operation stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Establish the control connection and authenticate.
    Connect,
    /// Tear down the control connection.
    Disconnect,
    /// List a remote directory, consulting and populating the directory
    /// cache.
    List {
        path: ServerPath,
        /// Force a fresh listing even if a cached one is available and
        /// unexpired.
        refresh: bool,
    },
    /// Upload or download one file.
    FileTransfer(TransferSpec),
    /// Send a raw, protocol-specific command line with no structured
    /// parsing of the reply beyond the standard reply-code contract.
    Raw(String),
    /// Delete a single remote file.
    Delete { path: ServerPath, file: String },
    /// Recursively remove a remote directory.
    RemoveDir { path: ServerPath, dir: String },
    /// Create a remote directory (and, if needed, its ancestors).
    Mkdir(ServerPath),
    /// Rename/move a remote file or directory.
    Rename {
        from_path: ServerPath,
        from_file: String,
        to_path: ServerPath,
        to_file: String,
    },
    /// Change remote permissions (protocols that support it).
    Chmod {
        path: ServerPath,
        file: String,
        mode: String,
    },
}

impl Command {
    /// A short, stable label for logging, independent of any embedded
    /// path or filename (which may contain arbitrary, possibly sensitive,
    /// text).
    pub fn kind_name(&self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::Disconnect => "disconnect",
            Command::List { .. } => "list",
            Command::FileTransfer(_) => "transfer",
            Command::Raw(_) => "raw",
            Command::Delete { .. } => "delete",
            Command::RemoveDir { .. } => "removedir",
            Command::Mkdir(_) => "mkdir",
            Command::Rename { .. } => "rename",
            Command::Chmod { .. } => "chmod",
        }
    }

    /// Whether this command requires an established, authenticated
    /// connection before it can run (everything except `Connect` itself).
    pub fn requires_connection(&self) -> bool {
        !matches!(self, Command::Connect)
    }
}
