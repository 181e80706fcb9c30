//! Notifications the engine emits to its host, and the async-request
//! protocol used when an operation needs host input mid-flight (spec §6).

use crate::command::CommandId;
use crate::direntry::DirectoryListing;
use crate::server::ServerPath;
use logging::Level;

/// A monotonically increasing identifier for one async-request round
/// trip. The host answers a request by returning the same number it was
/// given, so a stale or duplicate answer can be detected and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// A question the engine needs the host to answer before an operation can
/// continue (certificate trust, overwrite confirmation, interactive login
/// prompts, and so on).
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncRequest {
    /// The server presented a certificate; the host must accept, reject,
    /// or inspect it further before the TLS handshake completes.
    CertificateVerification {
        host: String,
        port: u16,
        fingerprint_sha256: String,
    },
    /// The remote target of a file transfer already exists; the host
    /// chooses how to proceed.
    FileExists {
        local_path: std::path::PathBuf,
        remote_path: ServerPath,
        remote_file: String,
        local_size: Option<u64>,
        remote_size: Option<u64>,
    },
    /// An interactive (keyboard-interactive) login step: the server sent
    /// one or more prompts the host must answer.
    InteractiveLogin { prompts: Vec<String> },
    /// An SFTP host key was received and is not yet trusted.
    HostKeyVerification {
        host: String,
        port: u16,
        fingerprint: String,
        changed_from_known: bool,
    },
}

/// Every event the engine can push to its host (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A log line at the given verbosity level.
    Log { level: Level, text: String },
    /// A command finished; carries the reply code it completed with (see
    /// [`crate::reply::ReplyCode`]) so the host can react without polling.
    OperationComplete {
        command: CommandId,
        reply: crate::reply::ReplyCode,
    },
    /// A fresh directory listing is available, either because it was
    /// requested or because the cache was invalidated and repopulated as
    /// a side effect of another operation.
    Listing {
        path: ServerPath,
        listing: DirectoryListing,
    },
    /// Byte-level transfer progress; rate-limited by the host layer, not
    /// by the engine itself.
    TransferStatus {
        command: CommandId,
        bytes_transferred: u64,
        bytes_total: Option<u64>,
    },
    /// The engine needs an answer before it can proceed.
    AsyncRequestRaised {
        request_id: RequestId,
        request: AsyncRequest,
    },
    /// The control connection's state changed (connected / disconnected).
    ConnectionStateChanged { connected: bool },
    /// A capability was learned or changed for the active server.
    CapabilityChanged,
}
