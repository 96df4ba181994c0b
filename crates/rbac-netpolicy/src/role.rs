//! Roles and their allowed-IP chains.
//!
//! Allowed addresses form a doubly-linked chain stored in an arena owned by
//! the role. The role keeps a reference to the most recently added entry
//! (the tail); `prev` links lead back to the first entry and `next` links
//! lead forward again.

use crate::ledger::AllocationLedger;
use rbac_types::Ipv4Address;
use serde::Serialize;
use tracing::debug;

/// Index of an allowed-IP entry inside its role's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AllowedIpId(usize);

impl AllowedIpId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One permitted caller address of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllowedIpEntry {
    pub address: u32,
    pub netmask: u32,
    pub prev: Option<AllowedIpId>,
    pub next: Option<AllowedIpId>,
}

impl AllowedIpEntry {
    pub fn address(&self) -> Ipv4Address {
        Ipv4Address::from(self.address)
    }

    pub fn netmask(&self) -> Ipv4Address {
        Ipv4Address::from(self.netmask)
    }
}

/// A caller identity owning a list of permitted source addresses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Role {
    name: String,
    allowed_ips: Option<AllowedIpId>,
    arena: Vec<AllowedIpEntry>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Most recently added entry.
    pub fn tail(&self) -> Option<AllowedIpId> {
        self.allowed_ips
    }

    /// First added entry.
    pub fn head(&self) -> Option<AllowedIpId> {
        self.walk_from_tail().last().map(|(id, _)| id)
    }

    pub fn get(&self, id: AllowedIpId) -> Option<&AllowedIpEntry> {
        self.arena.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Links a new entry after the current tail and makes it the tail.
    pub(crate) fn add_allowed_ip(
        &mut self,
        ledger: &mut AllocationLedger,
        address: u32,
        netmask: u32,
    ) -> AllowedIpId {
        ledger.note_allocation();

        let id = AllowedIpId(self.arena.len());
        let prev = self.allowed_ips;
        if let Some(prev_entry) = prev.and_then(|prev| self.arena.get_mut(prev.0)) {
            prev_entry.next = Some(id);
        }

        self.arena.push(AllowedIpEntry {
            address,
            netmask,
            prev,
            next: None,
        });
        self.allowed_ips = Some(id);

        debug!(
            role = %self.name,
            address = %Ipv4Address::from(address),
            netmask = %Ipv4Address::from(netmask),
            "Added allowed IP"
        );
        id
    }

    /// Walks from the tail through `prev` links.
    pub fn walk_from_tail(&self) -> ChainWalk<'_> {
        ChainWalk {
            role: self,
            cursor: self.allowed_ips,
            direction: Direction::Backward,
        }
    }

    /// Walks from `start` through `next` links.
    pub fn walk_forward(&self, start: AllowedIpId) -> ChainWalk<'_> {
        ChainWalk {
            role: self,
            cursor: Some(start),
            direction: Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Iterator over a role's allowed-IP chain.
#[derive(Debug, Clone)]
pub struct ChainWalk<'a> {
    role: &'a Role,
    cursor: Option<AllowedIpId>,
    direction: Direction,
}

impl<'a> Iterator for ChainWalk<'a> {
    type Item = (AllowedIpId, &'a AllowedIpEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let entry = self.role.get(id)?;
        self.cursor = match self.direction {
            Direction::Forward => entry.next,
            Direction::Backward => entry.prev,
        };
        Some((id, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addresses<'a>(walk: impl Iterator<Item = (AllowedIpId, &'a AllowedIpEntry)>) -> Vec<u32> {
        walk.map(|(_, entry)| entry.address).collect()
    }

    #[test]
    fn test_chain_linkage() {
        let mut ledger = AllocationLedger::new();
        let mut role = Role::new("admin");
        let e1 = role.add_allowed_ip(&mut ledger, 1, u32::MAX);
        let e2 = role.add_allowed_ip(&mut ledger, 2, u32::MAX);
        let e3 = role.add_allowed_ip(&mut ledger, 3, u32::MAX);

        assert_eq!(role.tail(), Some(e3));
        assert_eq!(role.head(), Some(e1));
        assert_eq!(addresses(role.walk_from_tail()), vec![3, 2, 1]);
        assert_eq!(addresses(role.walk_forward(e1)), vec![1, 2, 3]);
        assert_eq!(addresses(role.walk_forward(e2)), vec![2, 3]);

        let first = role.get(e1).unwrap();
        assert_eq!((first.prev, first.next), (None, Some(e2)));
        let last = role.get(e3).unwrap();
        assert_eq!((last.prev, last.next), (Some(e2), None));
        assert_eq!(ledger.count(), 3);
    }

    #[test]
    fn test_empty_role() {
        let role = Role::new("default");
        assert!(role.is_empty());
        assert_eq!(role.tail(), None);
        assert_eq!(role.head(), None);
        assert_eq!(role.walk_from_tail().count(), 0);
    }

    #[test]
    fn test_single_entry_has_no_links() {
        let mut ledger = AllocationLedger::new();
        let mut role = Role::new("user");
        let id = role.add_allowed_ip(&mut ledger, 0x7f00_0001, 0xff00_0000);
        let entry = role.get(id).unwrap();
        assert_eq!(entry.prev, None);
        assert_eq!(entry.next, None);
        assert_eq!(entry.address(), Ipv4Address::LOCALHOST);
        assert_eq!(entry.netmask().to_string(), "255.0.0.0");
    }
}
