//! Directive stream driver.
//!
//! The policy lexer emits one JSON object per network directive, tagged with
//! `op` and carrying the file and line it came from:
//!
//! ```json
//! {"file": "/etc/grsec/policy", "line": 12, "op": "subject", "name": "/usr/sbin/sshd"}
//! {"file": "/etc/grsec/policy", "line": 13, "op": "ip_acl", "mode": ["bind"],
//!  "address": "0.0.0.0", "prefix_len": 0, "ports": [22, 22], "protocols": ["stream", "tcp"]}
//! ```
//!
//! The driver replays the stream against a [`CompileSession`] in order,
//! tracking the current role and subject, and stops at the first error.

use crate::acl::{AclMode, IpAclTemplate};
use crate::error::{ConfigError, PolicyResult};
use crate::session::{CompileSession, CompiledPolicy, RoleId, SubjectId};
use rbac_types::{netmask_from_prefix_len, PortRange};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Prefix length used when a directive names a single address.
pub const HOST_PREFIX_LEN: u8 = 32;

fn host_prefix_len() -> u8 {
    HOST_PREFIX_LEN
}

/// One flag of a rule's mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeFlag {
    Connect,
    Bind,
    Invert,
}

impl From<ModeFlag> for AclMode {
    fn from(flag: ModeFlag) -> Self {
        match flag {
            ModeFlag::Connect => AclMode::CONNECT,
            ModeFlag::Bind => AclMode::BIND,
            ModeFlag::Invert => AclMode::INVERT,
        }
    }
}

fn fold_mode(flags: &[ModeFlag]) -> AclMode {
    flags
        .iter()
        .fold(AclMode::default(), |mode, flag| mode | AclMode::from(*flag))
}

/// A network directive as emitted by the policy lexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Directive {
    /// Starts a role; clears the current subject.
    Role { name: String },

    /// Starts a subject.
    Subject { name: String },

    /// Allows a socket family (or `all`) for the current subject.
    SockFamily { family: String },

    /// IP rule for the current subject with a literal address.
    IpAcl {
        mode: Vec<ModeFlag>,
        address: String,
        #[serde(default = "host_prefix_len")]
        prefix_len: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interface: Option<String>,
        #[serde(default)]
        ports: PortRange,
        #[serde(default)]
        protocols: Vec<String>,
    },

    /// IP rule for the current subject naming a host.
    HostAcl {
        mode: Vec<ModeFlag>,
        host: String,
        #[serde(default = "host_prefix_len")]
        prefix_len: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interface: Option<String>,
        #[serde(default)]
        ports: PortRange,
        #[serde(default)]
        protocols: Vec<String>,
    },

    /// Allowed caller address for the current role.
    RoleAllowedIp {
        address: String,
        #[serde(default = "host_prefix_len")]
        prefix_len: u8,
    },

    /// Allowed caller host for the current role.
    RoleAllowedHost {
        host: String,
        #[serde(default = "host_prefix_len")]
        prefix_len: u8,
    },
}

/// A directive with the source position it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedDirective {
    pub file: PathBuf,
    pub line: u64,
    #[serde(flatten)]
    pub directive: Directive,
}

/// Replays directives against a session.
pub struct DirectiveDriver {
    session: CompileSession,
    role: Option<RoleId>,
    subject: Option<SubjectId>,
}

impl DirectiveDriver {
    pub fn new(session: CompileSession) -> Self {
        Self {
            session,
            role: None,
            subject: None,
        }
    }

    pub fn session(&self) -> &CompileSession {
        &self.session
    }

    pub fn current_role(&self) -> Option<RoleId> {
        self.role
    }

    pub fn current_subject(&self) -> Option<SubjectId> {
        self.subject
    }

    /// Applies one directive at its source position.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error the directive raises.
    pub fn apply(&mut self, positioned: &PositionedDirective) -> PolicyResult<()> {
        if self.session.cursor().file() != positioned.file.as_path() {
            self.session.enter_file(&positioned.file);
        }
        self.session.set_line(positioned.line);

        match &positioned.directive {
            Directive::Role { name } => {
                self.role = Some(self.session.declare_role(name.as_str()));
                self.subject = None;
            }
            Directive::Subject { name } => {
                self.subject = Some(self.session.declare_subject(name.as_str()));
            }
            Directive::SockFamily { family } => {
                self.session.add_sock_family(self.subject, family)?;
            }
            Directive::IpAcl {
                mode,
                address,
                prefix_len,
                interface,
                ports,
                protocols,
            } => {
                let mut template = self.template(interface, *ports, protocols)?;
                template.address = self.session.parse_address(address)?;
                template.netmask = self.netmask(address, *prefix_len)?;
                self.session.add_ip_acl(self.subject, fold_mode(mode), &template)?;
            }
            Directive::HostAcl {
                mode,
                host,
                prefix_len,
                interface,
                ports,
                protocols,
            } => {
                let mut template = self.template(interface, *ports, protocols)?;
                template.netmask = self.netmask(host, *prefix_len)?;
                self.session
                    .add_host_acl(self.subject, fold_mode(mode), host, &mut template)?;
            }
            Directive::RoleAllowedIp { address, prefix_len } => {
                let role = self.require_role("IP")?;
                let addr = self.session.parse_address(address)?;
                let netmask = self.netmask(address, *prefix_len)?;
                self.session.add_role_allowed_ip(role, addr, netmask)?;
            }
            Directive::RoleAllowedHost { host, prefix_len } => {
                let role = self.require_role("host")?;
                let netmask = self.netmask(host, *prefix_len)?;
                self.session.add_role_allowed_host(role, host, netmask)?;
            }
        }

        debug!(pos = %self.session.position(), "Applied directive");
        Ok(())
    }

    fn require_role(&self, target: &str) -> PolicyResult<RoleId> {
        let role = self.role.ok_or_else(|| ConfigError::MissingRole {
            target: target.to_string(),
            pos: self.session.position(),
        })?;
        Ok(role)
    }

    fn template(
        &self,
        interface: &Option<String>,
        ports: PortRange,
        protocols: &[String],
    ) -> PolicyResult<IpAclTemplate> {
        let mut template = IpAclTemplate::new().with_ports(ports);
        template.interface = interface.clone();
        for token in protocols {
            self.session.resolve_protocol_or_type(&mut template, token)?;
        }
        Ok(template)
    }

    fn netmask(&self, literal: &str, prefix_len: u8) -> PolicyResult<u32> {
        let netmask = netmask_from_prefix_len(prefix_len).map_err(|_| ConfigError::InvalidAddressLiteral {
            literal: format!("{}/{}", literal, prefix_len),
            pos: self.session.position(),
        })?;
        Ok(netmask)
    }

    /// Ends the compilation.
    pub fn finish(self) -> CompiledPolicy {
        self.session.finish()
    }
}

/// Compiles a directive stream, stopping at the first error.
///
/// # Errors
///
/// Returns the first error raised; no partial policy is produced.
pub fn compile<I>(session: CompileSession, directives: I) -> PolicyResult<CompiledPolicy>
where
    I: IntoIterator<Item = PositionedDirective>,
{
    let mut driver = DirectiveDriver::new(session);
    for directive in directives {
        driver.apply(&directive)?;
    }
    Ok(driver.finish())
}
