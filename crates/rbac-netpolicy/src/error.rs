//! Error types for policy compilation.
//!
//! Every [`ConfigError`] is fatal: the compilation stops at the first one and
//! the policy is never activated. Each variant names the offending token and
//! the source position it came from.

use crate::position::SourcePos;
use std::io;
use thiserror::Error;

/// Result type alias for directive-level operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for session and driver operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors in the authored policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Socket family name not present in the family table.
    #[error("Invalid socket family {name} on {pos}.")]
    UnknownFamily { name: String, pos: SourcePos },

    /// Token is neither a socket type, a protocol keyword nor a known protocol name.
    #[error("Invalid type/protocol: {token} on {pos}.")]
    UnknownProtocolOrType { token: String, pos: SourcePos },

    /// Hostname lookup returned nothing.
    #[error("Error resolving hostname {host}, on {pos}.")]
    UnresolvableHost { host: String, pos: SourcePos },

    /// Hostname lookup returned an address outside the IPv4 family.
    #[error("Hostname {host} on {pos} does not resolve to an IPv4 address.")]
    NotIPv4 { host: String, pos: SourcePos },

    /// IP policy appears before any subject declaration.
    #[error(
        "Error on {pos}. Definition of an IP policy without a subject definition. \
         The RBAC system will not be allowed to be enabled until this problem is fixed."
    )]
    MissingSubject { pos: SourcePos },

    /// Role-scoped directive appears before any role declaration.
    #[error("Error on {pos}. Definition of allowed {target} without a role definition.")]
    MissingRole { target: String, pos: SourcePos },

    /// Address literal that does not parse as IPv4.
    #[error("Invalid IP {literal} on {pos}.")]
    InvalidAddressLiteral { literal: String, pos: SourcePos },
}

impl ConfigError {
    /// Returns the source position the error refers to.
    pub fn position(&self) -> &SourcePos {
        match self {
            ConfigError::UnknownFamily { pos, .. }
            | ConfigError::UnknownProtocolOrType { pos, .. }
            | ConfigError::UnresolvableHost { pos, .. }
            | ConfigError::NotIPv4 { pos, .. }
            | ConfigError::MissingSubject { pos }
            | ConfigError::MissingRole { pos, .. }
            | ConfigError::InvalidAddressLiteral { pos, .. } => pos,
        }
    }
}

/// Errors surfaced by a compilation session or the driver around it.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The authored policy is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An internal value violated an invariant of the compiler itself.
    #[error("Internal invariant violated: {message}")]
    Invariant { message: String },

    /// Compiler configuration is invalid.
    #[error("Invalid compiler configuration for {field}: {message}")]
    Settings { field: String, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PolicyError {
    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Creates an invalid compiler configuration error.
    pub fn settings(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Settings {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the configuration error if this is a policy authoring problem.
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            PolicyError::Config(err) => Some(err),
            _ => None,
        }
    }
}
