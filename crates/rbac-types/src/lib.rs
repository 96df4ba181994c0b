//! Network primitives shared by the RBAC policy tooling.
//!
//! This crate provides type-safe representations of the values that appear
//! in network access directives:
//!
//! - [`Ipv4Address`]: IPv4 addresses, including the legacy `inet_aton` forms
//! - [`netmask_from_prefix_len`] / [`prefix_len_from_netmask`]: CIDR helpers
//! - [`PortRange`]: inclusive L4 port ranges

mod ip;
mod port;

pub use ip::{netmask_from_prefix_len, prefix_len_from_netmask, Ipv4Address};
pub use port::PortRange;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("invalid port range: {low}-{high}")]
    InvalidPortRange { low: u16, high: u16 },

    #[error("invalid port: {0}")]
    InvalidPort(String),
}
