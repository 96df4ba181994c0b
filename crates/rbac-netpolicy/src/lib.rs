//! Network ACL compilation core for the RBAC policy administration tool.
//!
//! Turns network directives of a role-based access-control policy into the
//! in-memory graph the enforcement engine consults on socket operations:
//!
//! - [`bitmask`]: fixed-width word-array sets for families, protocols and socket types
//! - [`family`]: socket address family table with aliases and the `all` wildcard
//! - [`protocol`]: protocol/socket-type token resolution
//! - [`resolver`]: hostname expansion to IPv4 addresses
//! - [`subject`] / [`role`]: the owners of IP ACLs and allowed-IP chains
//! - [`ledger`]: heap-block accounting for the serializer
//! - [`session`]: the compilation session tying these together
//! - [`directive`]: replay of the lexer's directive stream
//!
//! # Example
//!
//! ```
//! use rbac_netpolicy::{AclMode, CompileSession, IpAclTemplate, StaticProtocolDb, StaticResolver};
//!
//! let mut session = CompileSession::new(
//!     Box::new(StaticProtocolDb::new()),
//!     Box::new(StaticResolver::new()),
//! );
//! session.enter_file("/etc/grsec/policy");
//! session.set_line(10);
//!
//! let subject = session.declare_subject("/usr/sbin/sshd");
//! let mut template = IpAclTemplate::new();
//! session.resolve_protocol_or_type(&mut template, "stream")?;
//! session.resolve_protocol_or_type(&mut template, "tcp")?;
//! session.add_ip_acl(Some(subject), AclMode::BIND, &template)?;
//!
//! let compiled = session.finish();
//! assert_eq!(compiled.allocations, 2);
//! # Ok::<(), rbac_netpolicy::PolicyError>(())
//! ```

pub mod acl;
pub mod bitmask;
pub mod config;
pub mod directive;
pub mod error;
pub mod family;
pub mod ledger;
pub mod position;
pub mod protocol;
pub mod resolver;
pub mod role;
pub mod session;
pub mod subject;

pub use acl::{AclMode, IpAclEntry, IpAclTemplate};
pub use bitmask::{BitmaskSet, FamilySet, ProtocolSet, TypeSet};
pub use config::CompilerConfig;
pub use directive::{compile, Directive, DirectiveDriver, PositionedDirective};
pub use error::{ConfigError, ConfigResult, PolicyError, PolicyResult};
pub use family::{family_id_from_name, family_name_from_id, FamilyId};
pub use ledger::AllocationLedger;
pub use position::{PositionOracle, SourceCursor, SourcePos};
pub use protocol::{ProtocolDatabase, StaticProtocolDb, SystemProtocolDb};
pub use resolver::{HostResolver, StaticResolver, SystemResolver};
pub use role::{AllowedIpEntry, AllowedIpId, Role};
pub use session::{CompileSession, CompiledPolicy, PolicyGraph, RoleId, SubjectId};
pub use subject::Subject;
