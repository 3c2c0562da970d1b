//! Core data types for authgate

use crate::RoleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the role-selecting prefix at the start of every principal
pub const ROLE_PREFIX_LEN: usize = 4;

/// Authenticating identity, human or agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Principal(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading characters that select a role, if the identifier is long enough
    pub fn role_prefix(&self) -> Option<&str> {
        let end = self
            .0
            .char_indices()
            .map(|(idx, c)| idx + c.len_utf8())
            .nth(ROLE_PREFIX_LEN - 1)?;
        Some(&self.0[..end])
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Principal::new(id)
    }
}

/// Authorization class of a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Monitoring,
    Admin,
    AgentReasoning,
    AgentFast,
    Agi,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::User,
        Role::Monitoring,
        Role::Admin,
        Role::AgentReasoning,
        Role::AgentFast,
        Role::Agi,
    ];

    /// Resolve a role from the principal prefix table
    pub fn from_prefix(prefix: &str) -> Option<Role> {
        match prefix {
            "USRS" => Some(Role::User),
            "MNTR" => Some(Role::Monitoring),
            "ADMN" => Some(Role::Admin),
            "AGNR" => Some(Role::AgentReasoning),
            "AGNF" => Some(Role::AgentFast),
            "AGIA" => Some(Role::Agi),
            _ => None,
        }
    }

    /// The principal prefix that selects this role
    pub fn prefix(&self) -> &'static str {
        match self {
            Role::User => "USRS",
            Role::Monitoring => "MNTR",
            Role::Admin => "ADMN",
            Role::AgentReasoning => "AGNR",
            Role::AgentFast => "AGNF",
            Role::Agi => "AGIA",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Monitoring => "monitoring",
            Role::Admin => "admin",
            Role::AgentReasoning => "agent_reasoning",
            Role::AgentFast => "agent_fast",
            Role::Agi => "agi",
        }
    }

    /// Channel class this role belongs to
    pub fn surface(&self) -> LoginSurface {
        match self {
            Role::User | Role::Monitoring | Role::Admin => LoginSurface::Web,
            Role::AgentReasoning | Role::AgentFast | Role::Agi => LoginSurface::Agent,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleError::UnknownRole(s.to_string()))
    }
}

/// Channel through which a principal authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginSurface {
    /// Interactive, form-based login
    Web,
    /// Programmatic login for automated agents
    Agent,
}

impl LoginSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginSurface::Web => "web",
            LoginSurface::Agent => "agent",
        }
    }
}

impl fmt::Display for LoginSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored secret and role of a principal. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub principal: Principal,
    pub secret: String,
    pub role: Role,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("principal", &self.principal)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_prefix_table() {
        for role in Role::ALL {
            assert_eq!(Role::from_prefix(role.prefix()), Some(role));
        }
        assert_eq!(Role::from_prefix("ZZZZ"), None);
        assert_eq!(Role::from_prefix("usrs"), None);
    }

    #[test]
    fn test_role_name_roundtrip() {
        assert_eq!("agent_reasoning".parse::<Role>().unwrap(), Role::AgentReasoning);
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(RoleError::UnknownRole("superuser".to_string()))
        );
        assert_eq!(serde_json::to_string(&Role::AgentFast).unwrap(), "\"agent_fast\"");
    }

    #[test]
    fn test_principal_role_prefix() {
        assert_eq!(Principal::from("USRSAB1234").role_prefix(), Some("USRS"));
        assert_eq!(Principal::from("AGIA").role_prefix(), Some("AGIA"));
        assert_eq!(Principal::from("USR").role_prefix(), None);
        assert_eq!(Principal::from("").role_prefix(), None);
    }

    #[test]
    fn test_record_debug_hides_secret() {
        let record = CredentialRecord {
            principal: Principal::from("USRSAB1234"),
            secret: "hunter2pass".to_string(),
            role: Role::User,
        };
        assert!(!format!("{:?}", record).contains("hunter2pass"));
    }
}
