//! Hostname expansion.
//!
//! Host directives are expanded at compile time into one rule per IPv4
//! address. The lookup blocks; compilation is a one-shot offline step.

use crate::error::{ConfigError, ConfigResult};
use crate::position::SourcePos;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use tracing::debug;

/// Name-resolution service.
pub trait HostResolver {
    /// Returns every address the name resolves to, in answer order.
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the platform's name service.
///
/// Answers are de-duplicated (the platform returns one per socket type). Like
/// an IPv4-family host query, only the IPv4 addresses are returned when the
/// answer contains any.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut addrs: Vec<IpAddr> = Vec::new();
        for sock_addr in (host, 0u16).to_socket_addrs()? {
            if !addrs.contains(&sock_addr.ip()) {
                addrs.push(sock_addr.ip());
            }
        }

        if addrs.iter().any(IpAddr::is_ipv4) {
            addrs.retain(IpAddr::is_ipv4);
        }
        Ok(addrs)
    }
}

/// Resolver answering from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the answer for `host`.
    pub fn with_host(mut self, host: impl Into<String>, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.hosts.insert(host.into(), addrs.into_iter().collect());
        self
    }
}

impl HostResolver for StaticResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts.get(host).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("unknown host {}", host))
        })
    }
}

/// Resolves `host` to its IPv4 addresses as 32-bit values.
///
/// # Errors
///
/// - [`ConfigError::UnresolvableHost`] if the lookup fails or is empty
/// - [`ConfigError::NotIPv4`] if any answer is outside the IPv4 family
pub fn resolve_host_to_ipv4(
    resolver: &dyn HostResolver,
    host: &str,
    pos: &SourcePos,
) -> ConfigResult<Vec<u32>> {
    let unresolvable = || ConfigError::UnresolvableHost {
        host: host.to_string(),
        pos: pos.clone(),
    };

    let addrs = resolver.lookup(host).map_err(|e| {
        debug!(host, error = %e, "Host lookup failed");
        unresolvable()
    })?;
    if addrs.is_empty() {
        return Err(unresolvable());
    }

    let v4 = addrs
        .iter()
        .map(|addr| match addr {
            IpAddr::V4(v4) => Some(u32::from(*v4)),
            IpAddr::V6(_) => None,
        })
        .collect::<Option<Vec<u32>>>()
        .ok_or_else(|| ConfigError::NotIPv4 {
            host: host.to_string(),
            pos: pos.clone(),
        })?;

    debug!(host, count = v4.len(), "Resolved host");
    Ok(v4)
}
