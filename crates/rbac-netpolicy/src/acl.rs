//! IP ACL entries.
//!
//! An [`IpAclEntry`] is one `connect`/`bind` rule of a subject: an address and
//! netmask, an optional interface, an L4 port range and the protocol and
//! socket-type sets it applies to. The directive parser fills an
//! [`IpAclTemplate`] while reading a rule and hands it to the session, which
//! stamps out one entry per concrete address.

use crate::bitmask::{ProtocolSet, TypeSet};
use rbac_types::{Ipv4Address, PortRange};
use serde::Serialize;
use std::fmt;

/// Rule mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct AclMode(u8);

impl AclMode {
    /// Rule applies to `bind()`.
    pub const BIND: AclMode = AclMode(0x01);
    /// Rule applies to `connect()`/`accept()`.
    pub const CONNECT: AclMode = AclMode(0x02);
    /// Rule matches everything except the given address.
    pub const INVERT: AclMode = AclMode(0x04);

    pub const fn from_bits(bits: u8) -> Self {
        AclMode(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: AclMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AclMode {
    type Output = AclMode;

    fn bitor(self, rhs: AclMode) -> AclMode {
        AclMode(self.0 | rhs.0)
    }
}

impl fmt::Display for AclMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(AclMode::CONNECT) {
            names.push("connect");
        }
        if self.contains(AclMode::BIND) {
            names.push("bind");
        }
        if self.contains(AclMode::INVERT) {
            names.push("invert");
        }
        write!(f, "{}", names.join("|"))
    }
}

/// Working copy of an IP rule while its tokens are being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpAclTemplate {
    pub interface: Option<String>,
    pub address: u32,
    pub netmask: u32,
    pub ports: PortRange,
    pub protocols: ProtocolSet,
    pub types: TypeSet,
}

impl IpAclTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: u32, netmask: u32) -> Self {
        self.address = address;
        self.netmask = netmask;
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    pub fn with_ports(mut self, ports: PortRange) -> Self {
        self.ports = ports;
        self
    }
}

/// One IP access rule owned by a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpAclEntry {
    pub mode: AclMode,
    pub interface: Option<String>,
    pub address: u32,
    pub netmask: u32,
    pub port_low: u16,
    pub port_high: u16,
    pub protocols: ProtocolSet,
    pub types: TypeSet,
}

impl IpAclEntry {
    /// Builds an entry from a template, copying every field.
    pub fn from_template(mode: AclMode, template: &IpAclTemplate) -> Self {
        Self {
            mode,
            interface: template.interface.clone(),
            address: template.address,
            netmask: template.netmask,
            port_low: template.ports.low(),
            port_high: template.ports.high(),
            protocols: template.protocols,
            types: template.types,
        }
    }

    pub fn address(&self) -> Ipv4Address {
        Ipv4Address::from(self.address)
    }

    pub fn netmask(&self) -> Ipv4Address {
        Ipv4Address::from(self.netmask)
    }

    /// Number of heap blocks this entry adds to the policy graph.
    pub(crate) fn heap_blocks(&self) -> u64 {
        1 + u64::from(self.interface.is_some())
    }
}

impl fmt::Display for IpAclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.mode, self.address(), self.netmask())?;
        if let Some(iface) = &self.interface {
            write!(f, " dev {}", iface)?;
        }
        write!(f, ":{}-{}", self.port_low, self.port_high)
    }
}
