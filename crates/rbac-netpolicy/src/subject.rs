//! Subjects and their IP ACLs.

use crate::acl::{AclMode, IpAclEntry, IpAclTemplate};
use crate::bitmask::{FamilySet, ProtocolSet, TypeSet};
use crate::ledger::AllocationLedger;
use serde::Serialize;
use tracing::debug;

/// A program profile owning socket-family and IP rules.
///
/// Entries keep declaration order. `protocols_union` and `types_union` are
/// the OR of every entry's sets after each insertion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subject {
    name: String,
    sock_families: FamilySet,
    ip_acls: Vec<IpAclEntry>,
    protocols_union: ProtocolSet,
    types_union: TypeSet,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sock_families(&self) -> &FamilySet {
        &self.sock_families
    }

    pub(crate) fn sock_families_mut(&mut self) -> &mut FamilySet {
        &mut self.sock_families
    }

    pub fn ip_acls(&self) -> &[IpAclEntry] {
        &self.ip_acls
    }

    pub fn protocols_union(&self) -> &ProtocolSet {
        &self.protocols_union
    }

    pub fn types_union(&self) -> &TypeSet {
        &self.types_union
    }

    /// Appends one entry built from `template`.
    ///
    /// The entry array grows by exactly one slot. The ledger counts the array
    /// the first time it is created, then the entry and its interface name.
    pub(crate) fn add_ip_acl(
        &mut self,
        ledger: &mut AllocationLedger,
        mode: AclMode,
        template: &IpAclTemplate,
    ) {
        if self.ip_acls.is_empty() {
            ledger.note_allocation();
        }

        let entry = IpAclEntry::from_template(mode, template);
        ledger.note_allocations(entry.heap_blocks());

        self.ip_acls.reserve_exact(1);
        self.protocols_union.union_with(&entry.protocols);
        self.types_union.union_with(&entry.types);

        debug!(
            subject = %self.name,
            entry = %entry,
            index = self.ip_acls.len(),
            "Added IP ACL"
        );
        self.ip_acls.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(protocol: usize, socktype: usize) -> IpAclTemplate {
        let mut template = IpAclTemplate::new();
        template.protocols.insert(protocol);
        template.types.insert(socktype);
        template
    }

    #[test]
    fn test_add_ip_acl_keeps_order_and_union() {
        let mut ledger = AllocationLedger::new();
        let mut subject = Subject::new("/usr/sbin/sshd");

        subject.add_ip_acl(&mut ledger, AclMode::BIND, &template(6, 1));
        subject.add_ip_acl(&mut ledger, AclMode::CONNECT, &template(17, 2));

        assert_eq!(subject.ip_acls().len(), 2);
        assert_eq!(subject.ip_acls()[0].mode, AclMode::BIND);
        assert_eq!(subject.ip_acls()[1].mode, AclMode::CONNECT);
        assert_eq!(subject.protocols_union().iter().collect::<Vec<_>>(), vec![6, 17]);
        assert_eq!(subject.types_union().iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_array_counted_once() {
        let mut ledger = AllocationLedger::new();
        let mut subject = Subject::new("/bin/ping");

        subject.add_ip_acl(&mut ledger, AclMode::CONNECT, &template(1, 3));
        assert_eq!(ledger.count(), 2);

        subject.add_ip_acl(&mut ledger, AclMode::CONNECT, &template(1, 3));
        subject.add_ip_acl(&mut ledger, AclMode::CONNECT, &template(1, 3).with_interface("lo"));
        assert_eq!(ledger.count(), 2 + 1 + 2);
    }

    #[test]
    fn test_new_subject_is_empty() {
        let subject = Subject::new("/");
        assert_eq!(subject.name(), "/");
        assert!(subject.ip_acls().is_empty());
        assert!(subject.protocols_union().is_empty());
        assert!(subject.sock_families().is_empty());
    }
}
