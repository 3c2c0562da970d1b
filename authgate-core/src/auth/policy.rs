//! Role policy: token lifetime per role and login-surface gating

use crate::auth::CredentialStore;
use crate::{ConfigError, LoginSurface, Role, RoleError, SurfaceError};
use std::collections::HashMap;
use std::time::Duration;

/// Roles that may log in through the interactive web form
pub const WEB_LOGIN_ROLES: &[Role] = &[Role::User, Role::Monitoring];
/// Roles that may log in through the agent endpoint
pub const AGENT_LOGIN_ROLES: &[Role] = &[Role::AgentReasoning, Role::AgentFast];

/// Static role -> TTL mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePolicy {
    ttls: HashMap<Role, Duration>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        RolePolicy::empty()
            .with_ttl(Role::Monitoring, Duration::from_secs(20 * 60))
            .with_ttl(Role::AgentReasoning, Duration::from_secs(2 * 60))
            .with_ttl(Role::AgentFast, Duration::from_secs(60))
            .with_ttl(Role::Admin, Duration::from_secs(60 * 60))
            .with_ttl(Role::User, Duration::from_secs(15 * 60))
            .with_ttl(Role::Agi, Duration::from_secs(30 * 60))
    }
}

impl RolePolicy {
    /// Policy with no roles configured
    pub fn empty() -> Self {
        RolePolicy {
            ttls: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, role: Role, ttl: Duration) -> Self {
        self.ttls.insert(role, ttl);
        self
    }

    pub fn without(mut self, role: Role) -> Self {
        self.ttls.remove(&role);
        self
    }

    /// Token lifetime for a role
    pub fn ttl(&self, role: Role) -> Result<Duration, RoleError> {
        self.ttls
            .get(&role)
            .copied()
            .ok_or_else(|| RoleError::UnknownRole(role.to_string()))
    }

    pub fn configured_roles(&self) -> impl Iterator<Item = (Role, Duration)> + '_ {
        self.ttls.iter().map(|(role, ttl)| (*role, *ttl))
    }

    /// Every role held by a loaded principal must have a TTL
    pub fn ensure_covers(&self, store: &CredentialStore) -> Result<(), ConfigError> {
        for role in store.roles() {
            if !self.ttls.contains_key(&role) {
                return Err(ConfigError::RoleWithoutTtl {
                    role: role.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Roles a surface is allowed to issue tokens for
    pub fn allowed_roles(surface: LoginSurface) -> &'static [Role] {
        match surface {
            LoginSurface::Web => WEB_LOGIN_ROLES,
            LoginSurface::Agent => AGENT_LOGIN_ROLES,
        }
    }

    /// Check that `role` may log in through `surface`
    pub fn gate(surface: LoginSurface, role: Role) -> Result<(), SurfaceError> {
        if Self::allowed_roles(surface).contains(&role) {
            Ok(())
        } else {
            Err(SurfaceError {
                role: role.to_string(),
                surface: surface.as_str(),
            })
        }
    }
}
