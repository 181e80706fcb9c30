//! Server identity and protocol-typed remote paths (spec §3, "Server
//! identity" and "Server path").

use std::fmt;

/// The wire protocol used to reach a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain FTP.
    Ftp,
    /// FTP over implicit TLS (the control connection is TLS from the first
    /// byte).
    FtpImplicitTls,
    /// FTP using `AUTH TLS`/`AUTH SSL` (explicit TLS negotiated in-band).
    FtpExplicitTls,
    /// SFTP, driven through a subprocess (see [`crate::options::ConfigOracle::sftp_keyfiles`]).
    Sftp,
    /// Object-storage protocol, also driven through a subprocess.
    ObjectStorage,
}

/// How the client authenticates with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonType {
    /// Username/password supplied up front.
    Normal,
    /// Anonymous login.
    Anonymous,
    /// Prompt the user for a password at connect time.
    Ask,
    /// Interactive, multi-step login (e.g. keyboard-interactive SFTP).
    Interactive,
    /// Key-file based login with no password prompt.
    KeyFile,
}

/// The character encoding the engine assumes for filenames on this server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Auto-detect (UTF-8 if the server advertises it, else a fallback).
    Auto,
    /// Force UTF-8.
    Utf8,
    /// A custom named encoding (e.g. "Shift_JIS").
    Custom(String),
}

/// Credentials travel alongside a [`Server`] rather than participating in
/// its equality, per spec §3 ("password equality is part of the credential
/// object").
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Plaintext password, if any.
    pub password: Option<String>,
    /// FTP "account" string, sent after a `331`/`332` ACCT prompt.
    pub account: Option<String>,
    /// Path to an SFTP private key file, if key-based auth is used.
    pub keyfile: Option<String>,
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.password == other.password
            && self.account == other.account
            && self.keyfile == other.keyfile
    }
}
impl Eq for Credentials {}

/// A server identity: everything that determines *where* and *as whom* a
/// connection is made, but not the secret used to authenticate (spec §3:
/// "Equality ignores the saved password").
#[derive(Debug, Clone)]
pub struct Server {
    /// Wire protocol.
    pub protocol: Protocol,
    /// Hostname or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Username, empty for anonymous logins.
    pub user: String,
    /// Authentication method.
    pub logon_type: LogonType,
    /// Filename encoding.
    pub encoding: Encoding,
    /// Minutes east of UTC the server's clock is assumed to run, or `None`
    /// if undiscovered (see [`crate::server::TIMEZONE_UNKNOWN`]).
    pub timezone_offset_minutes: Option<i32>,
    /// Maximum simultaneous connections the scheduler may open to this
    /// server; `0` means unlimited.
    pub max_connections: u32,
    /// Commands to send immediately after a successful login.
    pub post_login_commands: Vec<String>,
    /// If true, connections to this server bypass any configured proxy.
    pub bypass_proxy: bool,
    /// A user-assigned display name (bookmarks / site manager entries).
    pub name: Option<String>,
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.host == other.host
            && self.port == other.port
            && self.user == other.user
            && self.logon_type == other.logon_type
            && self.encoding == other.encoding
            && self.timezone_offset_minutes == other.timezone_offset_minutes
            && self.max_connections == other.max_connections
            && self.post_login_commands == other.post_login_commands
            && self.bypass_proxy == other.bypass_proxy
            && self.name == other.name
    }
}
impl Eq for Server {}

impl std::hash::Hash for Server {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Matches PartialEq: every field participating in equality is hashed.
        std::mem::discriminant(&self.protocol).hash(state);
        self.host.hash(state);
        self.port.hash(state);
        self.user.hash(state);
        std::mem::discriminant(&self.logon_type).hash(state);
        match &self.encoding {
            Encoding::Auto => 0u8.hash(state),
            Encoding::Utf8 => 1u8.hash(state),
            Encoding::Custom(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
        self.timezone_offset_minutes.hash(state);
        self.max_connections.hash(state);
        self.post_login_commands.hash(state);
        self.bypass_proxy.hash(state);
        self.name.hash(state);
    }
}

/// Dialects of server path syntax a [`ServerPath`] can be typed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathSyntax {
    /// Inherit from the owning [`Server`]'s protocol at use time.
    Default,
    Unix,
    Vms,
    Dos,
    Mvs,
}

/// A protocol-typed remote path (spec §3, "Server path").
///
/// Paths are cheap value objects: cloning copies a `Vec<String>` of path
/// segments plus a syntax tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ServerPath {
    syntax: Option<PathSyntax>,
    segments: Vec<String>,
    /// VMS/MVS paths can carry a separate "device"/"volume" prefix; kept as
    /// an opaque prefix string rendered ahead of the segment list.
    prefix: String,
}

impl ServerPath {
    /// Builds a path from already-split segments.
    pub fn new(syntax: PathSyntax, segments: Vec<String>) -> Self {
        Self {
            syntax: Some(syntax),
            segments,
            prefix: String::new(),
        }
    }

    /// An empty path: `CWD` with an empty path is a no-op per spec §4.4.1.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.prefix.is_empty()
    }

    pub fn syntax(&self) -> Option<PathSyntax> {
        self.syntax
    }

    pub fn set_syntax(&mut self, syntax: PathSyntax) {
        self.syntax = Some(syntax);
    }

    /// Parses a slash-delimited Unix-style path. Other syntaxes are not
    /// implemented by the engine core (the text parser is a non-goal); the
    /// CLI/host layer is expected to produce `ServerPath` values directly
    /// for non-Unix dialects.
    pub fn parse_unix(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self::new(PathSyntax::Unix, segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a new path with `segment` appended.
    pub fn add_segment(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self {
            syntax: self.syntax,
            segments,
            prefix: self.prefix.clone(),
        }
    }

    /// Returns the parent path, or `None` if this path has no parent
    /// (already at the root).
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            syntax: self.syntax,
            segments,
            prefix: self.prefix.clone(),
        })
    }

    pub fn has_parent(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Whether `self` is a (strict, or equal-if `allow_equal`) ancestor of
    /// `other`.
    pub fn is_parent_of(&self, other: &Self, allow_equal: bool) -> bool {
        if self.segments.len() > other.segments.len() {
            return false;
        }
        if self.segments.len() == other.segments.len() {
            return allow_equal && self == other;
        }
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Formats a filename underneath this path, optionally omitting the
    /// directory prefix (used e.g. for `CWD subdir` vs `CWD /abs/subdir`).
    pub fn format_filename(&self, name: &str, omit_prefix: bool) -> String {
        if omit_prefix || self.segments.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.safe_path(), name)
        }
    }

    /// A round-trippable textual form: `/a/b/c`. Always slash-joined
    /// regardless of syntax, matching upstream's `GetSafePath`, which
    /// exists precisely so paths can be persisted and later re-parsed.
    pub fn safe_path(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }

    /// The deepest common ancestor of `self` and `other`.
    pub fn common_parent(&self, other: &Self) -> Self {
        let mut common = Vec::new();
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            if a == b {
                common.push(a.clone());
            } else {
                break;
            }
        }
        Self {
            syntax: self.syntax,
            segments: common,
            prefix: self.prefix.clone(),
        }
    }
}

impl fmt::Display for ServerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.safe_path())
    }
}

impl PartialOrd for ServerPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ServerPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.segments.cmp(&other.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ServerPath {
        ServerPath::parse_unix(s)
    }

    #[test]
    fn parent_of_root_is_none() {
        assert!(p("/").parent().is_none());
    }

    #[test]
    fn is_parent_of_respects_allow_equal() {
        assert!(p("/a").is_parent_of(&p("/a/b"), false));
        assert!(!p("/a").is_parent_of(&p("/a"), false));
        assert!(p("/a").is_parent_of(&p("/a"), true));
        assert!(!p("/a/b").is_parent_of(&p("/a"), true));
    }

    #[test]
    fn common_parent_stops_at_first_divergence() {
        assert_eq!(p("/a/b/c").common_parent(&p("/a/b/d")), p("/a/b"));
        assert_eq!(p("/a/x").common_parent(&p("/b/y")), p("/"));
    }

    #[test]
    fn safe_path_round_trips_through_add_segment() {
        let root = ServerPath::empty();
        let a = root.add_segment("a");
        let ab = a.add_segment("b");
        assert_eq!(ab.safe_path(), "/a/b");
    }

    #[test]
    fn server_equality_ignores_credentials() {
        let base = Server {
            protocol: Protocol::Ftp,
            host: "example.test".into(),
            port: 21,
            user: "anon".into(),
            logon_type: LogonType::Normal,
            encoding: Encoding::Auto,
            timezone_offset_minutes: None,
            max_connections: 1,
            post_login_commands: vec![],
            bypass_proxy: false,
            name: None,
        };
        let other = base.clone();
        assert_eq!(base, other);
        let creds_a = Credentials {
            password: Some("one".into()),
            ..Default::default()
        };
        let creds_b = Credentials {
            password: Some("two".into()),
            ..Default::default()
        };
        assert_ne!(creds_a, creds_b);
    }
}
