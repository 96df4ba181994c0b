//! Protocol and socket type resolution.
//!
//! Directive tokens such as `tcp`, `stream` or `proto:47` are folded into an
//! IP ACL template's protocol and socket-type bitmasks. Tokens that are not
//! keywords fall back to the system protocol database (`/etc/protocols`).

use crate::acl::IpAclTemplate;
use crate::error::{ConfigError, ConfigResult, PolicyError, PolicyResult};
use crate::position::SourcePos;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// IP protocol numbers referenced by keywords.
pub mod ipproto {
    pub const IP: usize = 0;
    pub const TCP: usize = 6;
    pub const UDP: usize = 17;
    pub const RAW: usize = 255;
}

/// Socket type numbers referenced by keywords.
pub mod socktype {
    pub const STREAM: usize = 1;
    pub const DGRAM: usize = 2;
    pub const RAW: usize = 3;
    pub const RDM: usize = 4;
}

/// Prefix of the numeric protocol escape (`proto:<n>`).
pub const NUMERIC_PROTO_PREFIX: &str = "proto:";

/// Name to protocol-number lookup.
pub trait ProtocolDatabase {
    fn lookup(&self, name: &str) -> Option<u8>;
}

/// Protocol database backed by a fixed set of names.
#[derive(Debug, Clone, Default)]
pub struct StaticProtocolDb {
    entries: HashMap<String, u8>,
}

impl StaticProtocolDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a protocol name.
    pub fn with(mut self, name: impl Into<String>, number: u8) -> Self {
        self.entries.insert(name.into(), number);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, u8)> for StaticProtocolDb {
    fn from_iter<I: IntoIterator<Item = (String, u8)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ProtocolDatabase for StaticProtocolDb {
    fn lookup(&self, name: &str) -> Option<u8> {
        self.entries.get(name).copied()
    }
}

/// Protocol database loaded from an `/etc/protocols` style file.
///
/// Each line holds `name number [aliases...]`; `#` starts a comment. Lines
/// with a number outside 0-255 are skipped.
#[derive(Debug, Clone, Default)]
pub struct SystemProtocolDb {
    inner: StaticProtocolDb,
}

impl SystemProtocolDb {
    /// Default location of the system database.
    pub const DEFAULT_PATH: &'static str = "/etc/protocols";

    /// Parses protocol database contents.
    pub fn parse(contents: &str) -> Self {
        let mut entries = HashMap::new();

        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let (Some(name), Some(number)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(number) = number.parse::<u8>() else {
                debug!(name, number, "Skipping protocol entry with invalid number");
                continue;
            };

            for alias in std::iter::once(name).chain(fields) {
                entries.entry(alias.to_string()).or_insert(number);
            }
        }

        Self {
            inner: StaticProtocolDb { entries },
        }
    }

    /// Loads the database from `path`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let db = Self::parse(&contents);
        debug!(path = %path.as_ref().display(), names = db.len(), "Loaded protocol database");
        Ok(db)
    }

    /// Loads the database from `path`, falling back to an empty database if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an IO error for failures other than a missing file.
    pub fn load_or_empty(path: impl AsRef<Path>) -> PolicyResult<Self> {
        match Self::load(path.as_ref()) {
            Err(PolicyError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    path = %path.as_ref().display(),
                    "Protocol database not found, only protocol keywords will resolve"
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ProtocolDatabase for SystemProtocolDb {
    fn lookup(&self, name: &str) -> Option<u8> {
        self.inner.lookup(name)
    }
}

/// Folds one protocol or socket-type token into `template`.
///
/// | token | effect |
/// |---|---|
/// | `raw_proto` | protocol 255 |
/// | `raw_sock` | socket type raw |
/// | `any_sock` | every socket type except 0 |
/// | `any_proto` | every protocol |
/// | `stream`, `dgram`, `rdm` | that socket type |
/// | `tcp`, `udp` | protocol 0 and the named protocol |
/// | `proto:<n>` | protocol `n` |
/// | anything else | looked up in `db` |
///
/// # Errors
///
/// Returns [`ConfigError::UnknownProtocolOrType`] for any token that does not
/// resolve, including a `proto:` escape that is not a number in 0-255.
pub fn resolve_protocol_or_type(
    template: &mut IpAclTemplate,
    token: &str,
    db: &dyn ProtocolDatabase,
    pos: &SourcePos,
) -> ConfigResult<()> {
    let unknown = || ConfigError::UnknownProtocolOrType {
        token: token.to_string(),
        pos: pos.clone(),
    };

    match token {
        "raw_proto" => {
            template.protocols.insert(ipproto::RAW);
        }
        "raw_sock" => {
            template.types.insert(socktype::RAW);
        }
        "any_sock" => {
            template.types.insert_all();
            // there is no socket type 0
            template.types.remove(0);
        }
        "any_proto" => template.protocols.insert_all(),
        "stream" => {
            template.types.insert(socktype::STREAM);
        }
        "dgram" => {
            template.types.insert(socktype::DGRAM);
        }
        "rdm" => {
            template.types.insert(socktype::RDM);
        }
        // tcp and udp also carry protocol 0 for sockets created with IPPROTO_IP
        "tcp" => {
            template.protocols.insert(ipproto::IP);
            template.protocols.insert(ipproto::TCP);
        }
        "udp" => {
            template.protocols.insert(ipproto::IP);
            template.protocols.insert(ipproto::UDP);
        }
        _ => {
            let number = match token.strip_prefix(NUMERIC_PROTO_PREFIX) {
                Some(digits) => digits.parse::<u8>().map_err(|_| unknown())?,
                None => db.lookup(token).ok_or_else(unknown)?,
            };
            template.protocols.insert(usize::from(number));
        }
    }

    debug!(token, "Resolved protocol/type token");
    Ok(())
}
