#![deny(unsafe_code)]

//! Verbosity configuration and log-event queue shared by every crate in the
//! transfer-engine workspace.
//!
//! Higher layers never format a string and decide whether to show it in the
//! same place: [`Level::is_enabled`] is consulted once, centrally, so that a
//! future change to verbosity policy cannot silently diverge between the
//! cache, session, and scheduler crates. When the `tracing` feature is
//! enabled, accepted events are additionally forwarded to the `tracing`
//! crate's dispatcher, matching the bridge pattern used elsewhere in this
//! workspace's logging-adjacent crates.

use std::collections::VecDeque;
use std::sync::OnceLock;

use parking_lot::Mutex;

/// The nine log levels a consumer can be notified of.
///
/// Ordering here is declaration order, not severity; filtering is driven by
/// [`Level::is_enabled`] rather than a single linear threshold, because the
/// debug sub-levels and `RawList` are gated independently in upstream
/// behavior (raw listing output is noisy even at high debug verbosity and is
/// opted into separately).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// User-facing status line (e.g. "Connecting to host...").
    Status,
    /// A recoverable or fatal error worth surfacing unconditionally.
    Error,
    /// A command about to be sent to the server.
    Command,
    /// A raw server reply line.
    Response,
    /// Informational debug output.
    DebugInfo,
    /// A debug-level warning that does not abort the operation.
    DebugWarning,
    /// Verbose debug tracing (protocol state transitions).
    DebugVerbose,
    /// Maximal debug tracing (byte-level detail).
    DebugDebug,
    /// Unparsed directory-listing lines, shown only when explicitly enabled.
    RawList,
}

impl Level {
    /// Returns the debug rank (1..=4) for the four `Debug*` levels, or
    /// `None` for levels that aren't part of the debug ladder.
    fn debug_rank(self) -> Option<u8> {
        match self {
            Level::DebugInfo => Some(1),
            Level::DebugWarning => Some(2),
            Level::DebugVerbose => Some(3),
            Level::DebugDebug => Some(4),
            _ => None,
        }
    }

    /// Whether a message at this level should be emitted under `config`.
    ///
    /// `Status`, `Error`, `Command`, and `Response` are always enabled: they
    /// correspond to the host's `logging_detailed` toggle affecting only
    /// formatting, not visibility, in upstream FileZilla's engine.
    pub fn is_enabled(self, config: &VerbosityConfig) -> bool {
        match self.debug_rank() {
            Some(rank) => rank <= config.debug_level,
            None => {
                if matches!(self, Level::RawList) {
                    config.raw_listing
                } else {
                    true
                }
            }
        }
    }
}

/// Mirrors the `logging_debug_level` / `logging_raw_listing` /
/// `logging_detailed` configuration-oracle options from the engine spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerbosityConfig {
    /// 0..=4, gating the four `Debug*` levels.
    pub debug_level: u8,
    /// Gates [`Level::RawList`].
    pub raw_listing: bool,
    /// Whether status/error messages should include extended detail
    /// (source location, timestamps). Formatting-only; never affects
    /// whether a message is emitted.
    pub detailed: bool,
}

impl VerbosityConfig {
    /// Clamps `debug_level` into the valid `0..=4` range.
    pub fn new(debug_level: u8, raw_listing: bool, detailed: bool) -> Self {
        Self {
            debug_level: debug_level.min(4),
            raw_listing,
            detailed,
        }
    }
}

/// A single queued log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// The level the message was logged at.
    pub level: Level,
    /// The rendered message text.
    pub text: String,
}

struct GlobalState {
    config: VerbosityConfig,
    queue: VecDeque<LogEvent>,
}

static STATE: OnceLock<Mutex<GlobalState>> = OnceLock::new();

fn state() -> &'static Mutex<GlobalState> {
    STATE.get_or_init(|| {
        Mutex::new(GlobalState {
            config: VerbosityConfig::default(),
            queue: VecDeque::new(),
        })
    })
}

/// Installs the process-wide verbosity configuration. Safe to call more
/// than once; later calls simply replace the configuration (a host may
/// reread its configuration oracle at any time).
pub fn init(config: VerbosityConfig) {
    state().lock().config = config;
}

/// Returns the currently installed verbosity configuration.
pub fn config() -> VerbosityConfig {
    state().lock().config
}

/// Logs `text` at `level`, subject to [`Level::is_enabled`]. Returns `true`
/// if the message was accepted into the queue.
pub fn log(level: Level, text: impl Into<String>) -> bool {
    let mut guard = state().lock();
    if !level.is_enabled(&guard.config) {
        return false;
    }
    let text = text.into();
    #[cfg(feature = "tracing")]
    bridge_to_tracing(level, &text);
    guard.queue.push_back(LogEvent { level, text });
    true
}

#[cfg(feature = "tracing")]
fn bridge_to_tracing(level: Level, text: &str) {
    match level {
        Level::Error => tracing::error!("{text}"),
        Level::Status | Level::Command | Level::Response => tracing::info!("{text}"),
        Level::DebugWarning => tracing::warn!("{text}"),
        Level::DebugInfo | Level::DebugVerbose | Level::DebugDebug | Level::RawList => {
            tracing::debug!("{text}")
        }
    }
}

/// Drains and returns every event queued so far, in FIFO order.
pub fn drain_events() -> Vec<LogEvent> {
    let mut guard = state().lock();
    guard.queue.drain(..).collect()
}
