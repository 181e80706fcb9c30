//! The reply-code bitfield (spec §7): the engine-visible result of a
//! command, as opposed to the narrower `thiserror` types other crates in
//! this workspace use between a crate and its direct caller.

bitflags::bitflags! {
    /// Flags describing how a command completed. Multiple flags can be
    /// set at once (e.g. `ERROR | DISCONNECTED` when a connection drop
    /// caused the failure), matching upstream's combinable reply-code
    /// bitmask rather than a single enum discriminant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReplyCode: u32 {
        /// The command completed successfully.
        const OK = 1 << 0;
        /// The operation is not finished; more processing will follow
        /// (used internally between operation-stack frames, never
        /// surfaced alone to the host).
        const CONTINUE = 1 << 1;
        /// The underlying I/O would block; the caller should wait for
        /// readiness and retry.
        const WOULDBLOCK = 1 << 2;
        /// Generic failure.
        const ERROR = 1 << 3;
        /// The control connection was lost.
        const DISCONNECTED = 1 << 4;
        /// A failure from which the session cannot recover by retrying.
        const CRITICALERROR = 1 << 5;
        /// The operation exceeded its time budget.
        const TIMEOUT = 1 << 6;
        /// A local write failed (disk full, permissions).
        const WRITEFAILED = 1 << 7;
        /// Authentication failed due to a bad password/key.
        const PASSWORDFAILED = 1 << 8;
        /// The operation was canceled by the host.
        const CANCELED = 1 << 9;
        /// The server or protocol does not support this operation.
        const NOTSUPPORTED = 1 << 10;
        /// A symbolic link was expected to resolve to a directory but
        /// does not.
        const LINKNOTDIR = 1 << 11;
        /// `Connect` was issued while already connected.
        const ALREADYCONNECTED = 1 << 12;
        /// An operation requiring a connection was issued while
        /// disconnected.
        const NOTCONNECTED = 1 << 13;
        /// An invariant the engine itself is responsible for was
        /// violated; indicates a bug rather than an environmental
        /// failure.
        const INTERNALERROR = 1 << 14;
        /// A command argument was malformed.
        const SYNTAXERROR = 1 << 15;
        /// The engine is busy and cannot accept the command right now.
        const BUSY = 1 << 16;
    }
}

impl ReplyCode {
    /// Whether this combination represents overall success. `OK` alone,
    /// or `OK` combined with purely informational flags, counts; any
    /// error-class flag does not.
    pub fn is_success(self) -> bool {
        self.contains(ReplyCode::OK) && !self.intersects(Self::ERROR_CLASS)
    }

    /// Whether this combination indicates the control connection is gone
    /// and must be re-established before anything else can run.
    pub fn is_disconnected(self) -> bool {
        self.contains(ReplyCode::DISCONNECTED)
    }

    /// Whether the scheduler should treat this as retry-worthy (a
    /// transient failure) as opposed to fatal.
    pub fn is_retryable(self) -> bool {
        self.intersects(
            ReplyCode::DISCONNECTED | ReplyCode::TIMEOUT | ReplyCode::WOULDBLOCK | ReplyCode::BUSY,
        ) && !self.intersects(ReplyCode::CRITICALERROR | ReplyCode::CANCELED)
    }

    /// All flags that mark a command as having failed in some way.
    pub const ERROR_CLASS: ReplyCode = ReplyCode::ERROR
        .union(ReplyCode::DISCONNECTED)
        .union(ReplyCode::CRITICALERROR)
        .union(ReplyCode::TIMEOUT)
        .union(ReplyCode::WRITEFAILED)
        .union(ReplyCode::PASSWORDFAILED)
        .union(ReplyCode::CANCELED)
        .union(ReplyCode::NOTSUPPORTED)
        .union(ReplyCode::LINKNOTDIR)
        .union(ReplyCode::ALREADYCONNECTED)
        .union(ReplyCode::NOTCONNECTED)
        .union(ReplyCode::INTERNALERROR)
        .union(ReplyCode::SYNTAXERROR);
}
