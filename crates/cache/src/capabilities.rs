//! The server-capability registry (spec §4.3), grounded on upstream's
//! `CServerCapabilities`/`servercapabilities.h`.

use rustc_hash::FxHashMap as HashMap;

use xfer_core::server::Server;

/// The closed vocabulary of capabilities the engine tracks, recovered in
/// full from `servercapabilities.h` (the distilled spec only gestures at
/// "capability flags" in prose).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityName {
    SystCommand,
    FeatCommand,
    ClntCommand,
    Utf8Command,
    MlsdCommand,
    OpstMlstCommand,
    MfmtCommand,
    MdtmCommand,
    SizeCommand,
    ModeZSupport,
    TvfsSupport,
    ListHiddenSupport,
    RestStream,
    EpsvCommand,
    TlsResume,
    TimezoneOffset,
    AuthTlsCommand,
    AuthSslCommand,
    Resume2gbBug,
    Resume4gbBug,
}

/// A tri-state capability value: not yet probed, present, or absent.
/// `Unknown` is distinct from `No` so the engine can tell "never checked"
/// from "checked and it isn't supported".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Capability {
    #[default]
    Unknown,
    Yes,
    No,
}

impl Capability {
    pub fn is_known(self) -> bool {
        !matches!(self, Capability::Unknown)
    }

    pub fn is_supported(self) -> bool {
        matches!(self, Capability::Yes)
    }
}

/// Per-server capability data: the tri-state flags plus a handful of
/// associated values some capabilities carry (e.g. the detected timezone
/// offset).
#[derive(Debug, Clone, Default)]
struct ServerCapabilities {
    flags: HashMap<CapabilityName, Capability>,
    timezone_offset_minutes: Option<i32>,
}

/// Registry of capabilities keyed by [`Server`] identity. One registry is
/// normally shared by every session connected to the same logical server
/// set, matching upstream's single process-wide `CServerCapabilities`
/// instance.
#[derive(Default)]
pub struct CapabilityRegistry {
    servers: HashMap<Server, ServerCapabilities>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, server: &Server, name: CapabilityName) -> Capability {
        self.servers
            .get(server)
            .and_then(|s| s.flags.get(&name))
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&mut self, server: &Server, name: CapabilityName, value: Capability) {
        self.servers
            .entry(server.clone())
            .or_default()
            .flags
            .insert(name, value);
    }

    pub fn timezone_offset(&self, server: &Server) -> Option<i32> {
        self.servers.get(server).and_then(|s| s.timezone_offset_minutes)
    }

    pub fn set_timezone_offset(&mut self, server: &Server, minutes: i32) {
        self.servers.entry(server.clone()).or_default().timezone_offset_minutes = Some(minutes);
        self.set(server, CapabilityName::TimezoneOffset, Capability::Yes);
    }

    /// Drops everything known about `server`, used when a server's
    /// identity changes in a way capabilities can't be assumed to survive
    /// (e.g. host/port edited in the site manager).
    pub fn forget_server(&mut self, server: &Server) {
        self.servers.remove(server);
    }
}
