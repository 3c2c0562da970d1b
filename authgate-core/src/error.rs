//! Error types for authgate

use std::path::PathBuf;
use thiserror::Error;

/// Startup errors. Any of these means the process must not serve traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("credential source unreadable: {path}: {source}")]
    CredentialSourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown role prefix {prefix:?} on line {line}")]
    UnknownRolePrefix { prefix: String, line: usize },

    #[error("role {role} has no configured TTL")]
    RoleWithoutTtl { role: String },

    #[error("invalid setting {name}={value:?}: {reason}")]
    InvalidSetting {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("settings file unreadable: {path}: {source}")]
    SettingsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential verification failures.
///
/// The variants exist for diagnostics only; callers outside the core must
/// report every one of them as the same "invalid credentials" signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown principal")]
    UnknownPrincipal,

    #[error("no secret configured for principal")]
    NoSecretConfigured,

    #[error("secret mismatch")]
    SecretMismatch,
}

impl AuthError {
    /// Outward-facing code shared by all variants
    pub fn public_code(&self) -> &'static str {
        "AUTH_INVALID_CREDENTIALS"
    }

    /// Internal diagnostic code, for logs only
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            AuthError::UnknownPrincipal => "AUTH_INVALID_CREDENTIALS_USERNAME",
            AuthError::NoSecretConfigured => "AUTH_SET_CREDENTIALS_PASSWORD",
            AuthError::SecretMismatch => "AUTH_INVALID_CREDENTIALS_PASSWORD",
        }
    }
}

/// Role lookup failures. Always a caller defect, never a server fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// A role that exists but may not log in through the given surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("role {role} not allowed on {surface} login")]
pub struct SurfaceError {
    pub role: String,
    pub surface: &'static str,
}

/// Token issuance and decoding failures
#[derive(Error, Debug)]
pub enum TokenError {
    #[error(transparent)]
    Role(#[from] RoleError),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("malformed token: {0}")]
    Malformed(String),
}
