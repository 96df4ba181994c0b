//! Compilation session.
//!
//! A [`CompileSession`] owns everything one policy compilation touches: the
//! role/subject graph, the allocation ledger, the source cursor and the two
//! lookup services. The directive parser calls the session's methods in the
//! order directives appear; the first error ends the compilation.

use crate::acl::{AclMode, IpAclTemplate};
use crate::error::{ConfigError, ConfigResult, PolicyError, PolicyResult};
use crate::family::{self, FamilyId};
use crate::ledger::AllocationLedger;
use crate::position::{PositionOracle, SourceCursor, SourcePos};
use crate::protocol::{self, ProtocolDatabase, SystemProtocolDb};
use crate::resolver::{self, HostResolver, SystemResolver};
use crate::role::{AllowedIpId, Role};
use crate::subject::Subject;
use rbac_types::Ipv4Address;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Handle to a subject in a session's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubjectId(usize);

/// Handle to a role in a session's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoleId(usize);

/// Roles and subjects in declaration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PolicyGraph {
    roles: Vec<Role>,
    subjects: Vec<Subject>,
}

impl PolicyGraph {
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(id.0)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.get(id.0)
    }

    /// Total IP ACL entries across all subjects.
    pub fn ip_acl_count(&self) -> usize {
        self.subjects.iter().map(|s| s.ip_acls().len()).sum()
    }

    /// Total allowed-IP entries across all roles.
    pub fn allowed_ip_count(&self) -> usize {
        self.roles.iter().map(Role::len).sum()
    }
}

/// Output of a finished compilation, handed to the serializer.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledPolicy {
    pub graph: PolicyGraph,
    /// Heap blocks reachable from the graph roots.
    pub allocations: u64,
}

/// State of one policy compilation.
pub struct CompileSession {
    graph: PolicyGraph,
    ledger: AllocationLedger,
    cursor: SourceCursor,
    protocols: Box<dyn ProtocolDatabase>,
    resolver: Box<dyn HostResolver>,
}

impl CompileSession {
    /// Creates a session using the given lookup services.
    pub fn new(protocols: Box<dyn ProtocolDatabase>, resolver: Box<dyn HostResolver>) -> Self {
        Self {
            graph: PolicyGraph::default(),
            ledger: AllocationLedger::new(),
            cursor: SourceCursor::new(),
            protocols,
            resolver,
        }
    }

    /// Creates a session backed by `/etc/protocols` and the platform resolver.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the protocol database exists but cannot be read.
    pub fn with_system_services() -> PolicyResult<Self> {
        let protocols = SystemProtocolDb::load_or_empty(SystemProtocolDb::DEFAULT_PATH)?;
        Ok(Self::new(Box::new(protocols), Box::new(SystemResolver)))
    }

    pub fn graph(&self) -> &PolicyGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn cursor(&self) -> &SourceCursor {
        &self.cursor
    }

    /// Switches the source position to a new file.
    pub fn enter_file(&mut self, file: impl AsRef<Path>) {
        self.cursor.enter_file(file);
    }

    /// Sets the current source line.
    pub fn set_line(&mut self, line: u64) {
        self.cursor.set_line(line);
    }

    /// Current source position.
    pub fn position(&self) -> SourcePos {
        self.cursor.position()
    }

    /// Adds a role to the graph.
    pub fn declare_role(&mut self, name: impl Into<String>) -> RoleId {
        let role = Role::new(name);
        debug!(role = %role.name(), pos = %self.position(), "Declared role");
        self.graph.roles.push(role);
        RoleId(self.graph.roles.len() - 1)
    }

    /// Adds a subject to the graph.
    pub fn declare_subject(&mut self, name: impl Into<String>) -> SubjectId {
        let subject = Subject::new(name);
        debug!(subject = %subject.name(), pos = %self.position(), "Declared subject");
        self.graph.subjects.push(subject);
        SubjectId(self.graph.subjects.len() - 1)
    }

    fn subject_mut(&mut self, subject: Option<SubjectId>) -> PolicyResult<&mut Subject> {
        let pos = self.position();
        let id = subject.ok_or(ConfigError::MissingSubject { pos })?;
        self.graph
            .subjects
            .get_mut(id.0)
            .ok_or_else(|| PolicyError::invariant(format!("subject handle {} is not in this session", id.0)))
    }

    fn role_mut(&mut self, role: RoleId) -> PolicyResult<&mut Role> {
        self.graph
            .roles
            .get_mut(role.0)
            .ok_or_else(|| PolicyError::invariant(format!("role handle {} is not in this session", role.0)))
    }

    /// Adds a socket family (or `all`) to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSubject`] without a subject and
    /// [`ConfigError::UnknownFamily`] for a name outside the family table.
    pub fn add_sock_family(&mut self, subject: Option<SubjectId>, name: &str) -> PolicyResult<FamilyId> {
        let pos = self.position();
        let subject = self.subject_mut(subject)?;
        let id = family::add_sock_family(subject.sock_families_mut(), name, &pos)?;
        debug!(subject = %subject.name(), family = %id, "Added socket family");
        Ok(id)
    }

    /// Folds a protocol or socket-type token into `template`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProtocolOrType`] for an unresolvable token.
    pub fn resolve_protocol_or_type(&self, template: &mut IpAclTemplate, token: &str) -> ConfigResult<()> {
        protocol::resolve_protocol_or_type(template, token, self.protocols.as_ref(), &self.position())
    }

    /// Parses an IPv4 literal (`inet_aton` forms) to its 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddressLiteral`] if the literal is not an
    /// IPv4 address.
    pub fn parse_address(&self, literal: &str) -> ConfigResult<u32> {
        Ipv4Address::from_inet_aton(literal)
            .map(|addr| addr.to_u32())
            .map_err(|_| ConfigError::InvalidAddressLiteral {
                literal: literal.to_string(),
                pos: self.position(),
            })
    }

    /// Appends one IP ACL entry built from `template` to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSubject`] without a subject; nothing is
    /// changed in that case.
    pub fn add_ip_acl(
        &mut self,
        subject: Option<SubjectId>,
        mode: AclMode,
        template: &IpAclTemplate,
    ) -> PolicyResult<()> {
        let Self { graph, ledger, cursor, .. } = self;
        let id = subject.ok_or_else(|| ConfigError::MissingSubject {
            pos: cursor.position(),
        })?;
        let subject = graph
            .subjects
            .get_mut(id.0)
            .ok_or_else(|| PolicyError::invariant(format!("subject handle {} is not in this session", id.0)))?;
        subject.add_ip_acl(ledger, mode, template);
        Ok(())
    }

    /// Expands `host` and appends one IP ACL entry per IPv4 address, each
    /// sharing every non-address field of `template`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSubject`], [`ConfigError::UnresolvableHost`]
    /// or [`ConfigError::NotIPv4`]; no entry is added on error.
    pub fn add_host_acl(
        &mut self,
        subject: Option<SubjectId>,
        mode: AclMode,
        host: &str,
        template: &mut IpAclTemplate,
    ) -> PolicyResult<()> {
        self.subject_mut(subject)?;
        let addrs = resolver::resolve_host_to_ipv4(self.resolver.as_ref(), host, &self.position())?;

        for addr in addrs {
            template.address = addr;
            self.add_ip_acl(subject, mode, template)?;
        }
        Ok(())
    }

    /// Appends an allowed caller address to a role's chain.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if `role` belongs to another session.
    pub fn add_role_allowed_ip(&mut self, role: RoleId, address: u32, netmask: u32) -> PolicyResult<AllowedIpId> {
        let Self { graph, ledger, .. } = self;
        let role = graph
            .roles
            .get_mut(role.0)
            .ok_or_else(|| PolicyError::invariant(format!("role handle {} is not in this session", role.0)))?;
        Ok(role.add_allowed_ip(ledger, address, netmask))
    }

    /// Expands `host` and appends one allowed-IP entry per IPv4 address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnresolvableHost`] or [`ConfigError::NotIPv4`];
    /// no entry is added on error.
    pub fn add_role_allowed_host(&mut self, role: RoleId, host: &str, netmask: u32) -> PolicyResult<()> {
        self.role_mut(role)?;
        let addrs = resolver::resolve_host_to_ipv4(self.resolver.as_ref(), host, &self.position())?;

        for addr in addrs {
            self.add_role_allowed_ip(role, addr, netmask)?;
        }
        Ok(())
    }

    /// Ends the compilation and hands the graph to the serializer.
    pub fn finish(self) -> CompiledPolicy {
        info!(
            roles = self.graph.roles.len(),
            subjects = self.graph.subjects.len(),
            ip_acls = self.graph.ip_acl_count(),
            allowed_ips = self.graph.allowed_ip_count(),
            allocations = self.ledger.count(),
            "Policy network ACLs compiled"
        );
        CompiledPolicy {
            graph: self.graph,
            allocations: self.ledger.count(),
        }
    }
}
