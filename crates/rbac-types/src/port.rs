//! L4 port range used by IP access rules.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive range of L4 ports (`low..=high`).
///
/// # Examples
///
/// ```
/// use rbac_types::PortRange;
///
/// let range: PortRange = "1024-2048".parse().unwrap();
/// assert_eq!(range.low(), 1024);
/// assert!(range.contains(1500));
///
/// assert!(PortRange::new(80, 22).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u16, u16)", into = "(u16, u16)")]
pub struct PortRange {
    low: u16,
    high: u16,
}

impl PortRange {
    /// Every port.
    pub const ANY: PortRange = PortRange {
        low: 0,
        high: u16::MAX,
    };

    /// Creates a new port range.
    ///
    /// # Errors
    ///
    /// Returns an error if `low > high`.
    pub const fn new(low: u16, high: u16) -> Result<Self, ParseError> {
        if low <= high {
            Ok(PortRange { low, high })
        } else {
            Err(ParseError::InvalidPortRange { low, high })
        }
    }

    /// Creates a range holding a single port.
    pub const fn single(port: u16) -> Self {
        PortRange {
            low: port,
            high: port,
        }
    }

    pub const fn low(&self) -> u16 {
        self.low
    }

    pub const fn high(&self) -> u16 {
        self.high
    }

    /// Returns true if `port` falls inside the range.
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.low && port <= self.high
    }

    /// Returns true if this range covers every port.
    pub const fn is_any(&self) -> bool {
        self.low == 0 && self.high == u16::MAX
    }
}

impl Default for PortRange {
    fn default() -> Self {
        PortRange::ANY
    }
}

impl TryFrom<(u16, u16)> for PortRange {
    type Error = ParseError;

    fn try_from((low, high): (u16, u16)) -> Result<Self, Self::Error> {
        PortRange::new(low, high)
    }
}

impl From<PortRange> for (u16, u16) {
    fn from(range: PortRange) -> Self {
        (range.low, range.high)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

impl FromStr for PortRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_port = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|_| ParseError::InvalidPort(p.to_string()))
        };

        match s.split_once('-') {
            Some((low, high)) => PortRange::new(parse_port(low)?, parse_port(high)?),
            None => Ok(PortRange::single(parse_port(s)?)),
        }
    }
}
