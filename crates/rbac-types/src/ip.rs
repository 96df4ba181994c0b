//! IPv4 address and netmask types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address wrapper with policy-specific parsing utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);
    pub const BROADCAST: Self = Ipv4Address(Ipv4Addr::BROADCAST);
    pub const LOCALHOST: Self = Ipv4Address(Ipv4Addr::LOCALHOST);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns the address as a 32-bit value (first octet in the high byte).
    pub fn to_u32(&self) -> u32 {
        u32::from(self.0)
    }

    /// Parses an address using the classic `inet_aton` rules.
    ///
    /// Accepts one to four dot-separated parts. Each part may be decimal,
    /// octal (leading `0`) or hexadecimal (leading `0x`). The last part fills
    /// all remaining bytes, so `10.1` is `10.0.0.1` and `0x7f000001` is
    /// `127.0.0.1`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidIpAddress`] if the literal does not match
    /// any accepted form or a part overflows its byte budget.
    pub fn from_inet_aton(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidIpAddress(s.to_string());

        let parts = s
            .split('.')
            .map(parse_aton_part)
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(invalid)?;

        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        let (last, leading) = parts.split_last().ok_or_else(invalid)?;
        if leading.iter().any(|part| *part > 0xff) {
            return Err(invalid());
        }

        let spare_bits = 8 * (4 - leading.len() as u32);
        if spare_bits < 32 && *last >> spare_bits != 0 {
            return Err(invalid());
        }

        let mut value = 0u32;
        for (idx, part) in leading.iter().enumerate() {
            value |= part << (24 - 8 * idx as u32);
        }
        value |= last;

        Ok(Ipv4Address(Ipv4Addr::from(value)))
    }
}

/// Parses one `inet_aton` component; `None` on bad digits or overflow.
fn parse_aton_part(part: &str) -> Option<u32> {
    if part.is_empty() {
        return None;
    }

    let (digits, radix) = if let Some(hex) = part
        .strip_prefix("0x")
        .or_else(|| part.strip_prefix("0X"))
    {
        (hex, 16)
    } else if part.len() > 1 && part.starts_with('0') {
        (&part[1..], 8)
    } else {
        (part, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    u32::from_str_radix(digits, radix).ok()
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

impl From<u32> for Ipv4Address {
    fn from(value: u32) -> Self {
        Ipv4Address(Ipv4Addr::from(value))
    }
}

impl From<Ipv4Address> for u32 {
    fn from(addr: Ipv4Address) -> Self {
        addr.to_u32()
    }
}

/// Builds a netmask from a CIDR prefix length.
///
/// # Errors
///
/// Returns an error if the prefix length exceeds 32.
pub fn netmask_from_prefix_len(prefix_len: u8) -> Result<u32, ParseError> {
    match prefix_len {
        0 => Ok(0),
        1..=32 => Ok(u32::MAX << (32 - u32::from(prefix_len))),
        _ => Err(ParseError::InvalidPrefixLength(prefix_len)),
    }
}

/// Returns the prefix length of a contiguous netmask, `None` otherwise.
pub fn prefix_len_from_netmask(netmask: u32) -> Option<u8> {
    let ones = netmask.leading_ones();
    if netmask.checked_shl(ones).unwrap_or(0) == 0 {
        Some(ones as u8)
    } else {
        None
    }
}
