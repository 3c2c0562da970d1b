//! Token lifecycle engine
//!
//! Wires the credential store, role policy, signing key and liveness cache
//! together behind the operations the HTTP layer calls.

use crate::auth::{
    verify_challenge, verify_password, CredentialStore, IssuedToken, LivenessCache, RolePolicy,
    SigningKey, TokenIssuer, TokenPayload, TokenValidator,
};
use crate::clock::{Clock, SystemClock};
use crate::config::check_secret_len;
use crate::{AuthConfig, AuthError, ConfigError, Principal, Role, TokenError};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared, cheaply clonable handle to the engine
#[derive(Debug, Clone)]
pub struct AuthEngine {
    store: Arc<CredentialStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    clock: Arc<dyn Clock>,
}

impl AuthEngine {
    /// Build an engine on the wall clock
    pub fn new(
        config: &AuthConfig,
        store: CredentialStore,
        policy: RolePolicy,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, store, policy, Arc::new(SystemClock))
    }

    /// Build an engine on an arbitrary clock. Fails if a loaded principal
    /// has a role without a TTL.
    pub fn with_clock(
        config: &AuthConfig,
        store: CredentialStore,
        policy: RolePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        policy.ensure_covers(&store)?;

        let key = match &config.signing_key {
            Some(secret) => {
                check_secret_len(secret)?;
                SigningKey::from_secret(config.algorithm, secret.as_bytes())
            }
            None => {
                warn!(
                    "No signing key configured, using a random key; tokens will not verify on other instances or after restart"
                );
                SigningKey::generate(config.algorithm)
            }
        };
        let key = Arc::new(key);

        for (role, ttl) in policy.configured_roles() {
            if ttl > config.cache_ttl {
                warn!(
                    "Role {} TTL {}s exceeds cache TTL {}s; its tokens are capped at {}s",
                    role,
                    ttl.as_secs(),
                    config.cache_ttl.as_secs(),
                    config.cache_ttl.as_secs()
                );
            }
        }

        let cache = Arc::new(LivenessCache::<TokenPayload>::new(
            config.cache_capacity,
            config.cache_ttl,
            Arc::clone(&clock),
        ));

        info!(
            "Token engine ready: {} principals, algorithm {}, cache capacity {}, cache TTL {}s",
            store.len(),
            key.algorithm(),
            cache.capacity(),
            cache.ttl().as_secs()
        );

        Ok(AuthEngine {
            store: Arc::new(store),
            issuer: TokenIssuer::new(
                Arc::clone(&key),
                policy,
                Arc::clone(&cache),
                Arc::clone(&clock),
            ),
            validator: TokenValidator::new(key, cache, Arc::clone(&clock)),
            clock,
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn policy(&self) -> &RolePolicy {
        self.issuer.policy()
    }

    pub fn now_unix(&self) -> u64 {
        self.clock.now_unix()
    }

    pub fn verify_password(&self, principal: &str, secret: &str) -> Result<(), AuthError> {
        verify_password(principal, secret, &self.store)
    }

    pub fn verify_challenge(&self, principal: &str, secret: &str) -> Result<Principal, AuthError> {
        verify_challenge(principal, secret, &self.store)
    }

    /// Role of a loaded principal
    pub fn role_of(&self, principal: &str) -> Option<Role> {
        self.store.role_of(principal)
    }

    pub fn issue_token(&self, principal: &Principal, role: Role) -> Result<IssuedToken, TokenError> {
        self.issuer.issue(principal, role)
    }

    pub fn is_token_valid(&self, token: &str) -> bool {
        self.validator.is_valid(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn store() -> CredentialStore {
        CredentialStore::parse("USRSAB1234=hunter2pass\nAGIAmind=deep\n").unwrap()
    }

    #[test]
    fn test_engine_rejects_uncovered_roles() {
        let err = AuthEngine::new(
            &AuthConfig::default(),
            store(),
            RolePolicy::default().without(Role::Agi),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::RoleWithoutTtl { .. }));
    }

    #[test]
    fn test_engines_with_same_key_agree_on_signatures() {
        let config = AuthConfig {
            signing_key: Some("pinned-signing-secret".to_string()),
            ..AuthConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let a = AuthEngine::with_clock(&config, store(), RolePolicy::default(), Arc::clone(&clock)).unwrap();
        let b = AuthEngine::with_clock(&config, store(), RolePolicy::default(), clock).unwrap();

        let issued = a.issue_token(&Principal::from("USRSAB1234"), Role::User).unwrap();
        assert!(a.is_token_valid(issued.token()));
        // Signature verifies on `b`, but `b` never issued it, so it is not live there
        assert!(!b.is_token_valid(issued.token()));
    }

    #[test]
    fn test_short_configured_key_fails_at_startup() {
        let config = AuthConfig {
            signing_key: Some("pinned".to_string()),
            ..AuthConfig::default()
        };
        let err = AuthEngine::new(&config, store(), RolePolicy::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn test_random_keys_do_not_cross_verify() {
        let a = AuthEngine::new(&AuthConfig::default(), store(), RolePolicy::default()).unwrap();
        let b = AuthEngine::new(&AuthConfig::default(), store(), RolePolicy::default()).unwrap();
        let issued = a.issue_token(&Principal::from("USRSAB1234"), Role::User).unwrap();
        assert!(a.is_token_valid(issued.token()));
        assert!(!b.is_token_valid(issued.token()));
    }

    #[test]
    fn test_clones_share_liveness() {
        let clock = ManualClock::starting_now();
        let engine = AuthEngine::with_clock(
            &AuthConfig::default(),
            store(),
            RolePolicy::default(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let handle = engine.clone();

        let issued = engine.issue_token(&Principal::from("AGIAmind"), Role::Agi).unwrap();
        assert!(handle.is_token_valid(issued.token()));

        clock.advance(Duration::from_secs(1800));
        assert!(!handle.is_token_valid(issued.token()));
    }
}
