//! Compiler configuration file.
//!
//! Loads `netpolicyc` settings from TOML. Every field has a default, so an
//! empty or missing file yields a working system-backed configuration.
//!
//! ```toml
//! [protocols]
//! path = "/etc/protocols"
//!
//! [resolver]
//! mode = "static"
//!
//! [resolver.hosts]
//! "ntp.example" = ["192.0.2.10", "192.0.2.11"]
//!
//! [logging]
//! level = "debug"
//! ```

use crate::error::{PolicyError, PolicyResult};
use crate::protocol::{ProtocolDatabase, SystemProtocolDb};
use crate::resolver::{HostResolver, StaticResolver, SystemResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/grsec/netpolicyc.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Protocol database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolsConfig {
    /// Path of the `/etc/protocols`-format file
    #[serde(default = "default_protocols_path")]
    pub path: PathBuf,
}

/// How hostnames are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Platform name service
    #[default]
    System,
    /// Fixed table from `[resolver.hosts]`
    Static,
}

/// Name resolution settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub mode: ResolverMode,

    /// Static answers, used when `mode = "static"`
    #[serde(default)]
    pub hosts: BTreeMap<String, Vec<IpAddr>>,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Complete compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub protocols: ProtocolsConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_protocols_path() -> PathBuf {
    PathBuf::from(SystemProtocolDb::DEFAULT_PATH)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self {
            path: default_protocols_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                PolicyError::settings(
                    path.display().to_string(),
                    format!("failed to parse config file: {}", e),
                )
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(PolicyError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> PolicyResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Validate configuration
    pub fn validate(&self) -> PolicyResult<()> {
        if self.protocols.path.as_os_str().is_empty() {
            return Err(PolicyError::settings("protocols.path", "must not be empty"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(PolicyError::settings(
                "logging.level",
                format!("unknown level {}", self.logging.level),
            ));
        }

        if self.resolver.mode == ResolverMode::Static {
            if let Some((host, _)) = self.resolver.hosts.iter().find(|(_, addrs)| addrs.is_empty()) {
                return Err(PolicyError::settings(
                    "resolver.hosts",
                    format!("host {} has no addresses", host),
                ));
            }
        } else if !self.resolver.hosts.is_empty() {
            warn!("resolver.hosts is ignored unless resolver.mode is \"static\"");
        }

        Ok(())
    }

    /// Builds the protocol database.
    pub fn protocol_db(&self) -> PolicyResult<Box<dyn ProtocolDatabase>> {
        let db = SystemProtocolDb::load_or_empty(&self.protocols.path)?;
        Ok(Box::new(db))
    }

    /// Builds the host resolver.
    pub fn host_resolver(&self) -> Box<dyn HostResolver> {
        match self.resolver.mode {
            ResolverMode::System => Box::new(SystemResolver),
            ResolverMode::Static => Box::new(
                self.resolver
                    .hosts
                    .iter()
                    .fold(StaticResolver::new(), |resolver, (host, addrs)| {
                        resolver.with_host(host.clone(), addrs.iter().copied())
                    }),
            ),
        }
    }
}
