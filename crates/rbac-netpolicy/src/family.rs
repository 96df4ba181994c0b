//! Socket address family table.
//!
//! Maps the family names accepted in `sock_allow_family` style directives to
//! Linux `AF_*` values. Several names may share a value (`inet`/`ipv4`); the
//! first name listed for a value is its canonical name. The `all` wildcard is
//! not part of the table.

use crate::bitmask::FamilySet;
use crate::error::{ConfigError, ConfigResult, PolicyError, PolicyResult};
use crate::position::SourcePos;
use serde::Serialize;
use std::fmt;

/// Identifier of a socket address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyId {
    /// A single `AF_*` value.
    Known(u8),
    /// Every family, including ones this table does not name.
    All,
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FamilyId::Known(id) => write!(f, "{}", id),
            FamilyId::All => write!(f, "all"),
        }
    }
}

/// Name of the wildcard family.
pub const ALL_FAMILIES: &str = "all";

/// Family name table, in declaration order.
pub static SOCK_FAMILIES: &[(&str, u8)] = &[
    ("unspec", 0),
    ("unix", 1),
    ("local", 1),
    ("inet", 2),
    ("ipv4", 2),
    ("ax25", 3),
    ("ipx", 4),
    ("appletalk", 5),
    ("netrom", 6),
    ("bridge", 7),
    ("atmpvc", 8),
    ("x25", 9),
    ("ipv6", 10),
    ("inet6", 10),
    ("rose", 11),
    ("decnet", 12),
    ("netbeui", 13),
    ("security", 14),
    ("key", 15),
    ("netlink", 16),
    ("route", 16),
    ("packet", 17),
    ("ash", 18),
    ("econet", 19),
    ("atmsvc", 20),
    ("rds", 21),
    ("sna", 22),
    ("irda", 23),
    ("ppox", 24),
    ("wanpipe", 25),
    ("llc", 26),
    ("ib", 27),
    ("mpls", 28),
    ("can", 29),
    ("tipc", 30),
    ("bluetooth", 31),
    ("iucv", 32),
    ("rxrpc", 33),
    ("isdn", 34),
    ("phonet", 35),
    ("ieee802154", 36),
    ("caif", 37),
    ("alg", 38),
    ("nfc", 39),
    ("vsock", 40),
    ("kcm", 41),
    ("qipcrtr", 42),
];

/// Resolves a family name by exact, case-sensitive match.
///
/// `all` resolves to [`FamilyId::All`].
///
/// # Errors
///
/// Returns [`ConfigError::UnknownFamily`] if the name is not in the table.
pub fn family_id_from_name(name: &str, pos: &SourcePos) -> ConfigResult<FamilyId> {
    if name == ALL_FAMILIES {
        return Ok(FamilyId::All);
    }

    SOCK_FAMILIES
        .iter()
        .find(|(family, _)| *family == name)
        .map(|(_, id)| FamilyId::Known(*id))
        .ok_or_else(|| ConfigError::UnknownFamily {
            name: name.to_string(),
            pos: pos.clone(),
        })
}

/// Returns the canonical name of a family id.
///
/// Ids only ever come from this table or trusted collaborators, so a miss is
/// an internal error rather than a policy error.
pub fn family_name_from_id(id: FamilyId) -> PolicyResult<&'static str> {
    match id {
        FamilyId::All => Ok(ALL_FAMILIES),
        FamilyId::Known(value) => SOCK_FAMILIES
            .iter()
            .find(|(_, family)| *family == value)
            .map(|(name, _)| *name)
            .ok_or_else(|| PolicyError::invariant(format!("Invalid socket family {} detected", value))),
    }
}

/// Adds a family to a subject's family set.
///
/// `all` sets every bit without consulting the table.
pub(crate) fn add_sock_family(
    families: &mut FamilySet,
    name: &str,
    pos: &SourcePos,
) -> ConfigResult<FamilyId> {
    if name == ALL_FAMILIES {
        families.insert_all();
        return Ok(FamilyId::All);
    }

    let id = family_id_from_name(name, pos)?;
    if let FamilyId::Known(value) = id {
        families.insert(usize::from(value));
    }
    Ok(id)
}
