//! Role-scoped bearer tokens
//!
//! A token is a signed assertion of subject, role, issue time and expiry.
//! Issuing one records it in the liveness cache; a token is valid only
//! while its signature and expiry check out AND the cache still holds it.

use crate::auth::{LivenessCache, RolePolicy, SigningKey};
use crate::clock::Clock;
use crate::{Principal, Role, TokenError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, VerificationOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Custom claims carried next to the registered ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleClaim {
    pub role: Role,
}

/// Decoded token contents, also stored as the liveness cache value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "sub")]
    pub subject: Principal,
    pub role: Role,
    #[serde(rename = "iat")]
    pub issued_at: u64,
    #[serde(rename = "exp")]
    pub expires_at: u64,
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    token: String,
    payload: TokenPayload,
}

impl IssuedToken {
    /// Serialized token string
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn payload(&self) -> &TokenPayload {
        &self.payload
    }

    /// Absolute expiry, Unix seconds
    pub fn expires_at(&self) -> u64 {
        self.payload.expires_at
    }

    /// Seconds left until expiry as seen from `now_unix`
    pub fn expires_in(&self, now_unix: u64) -> u64 {
        self.payload.expires_at.saturating_sub(now_unix)
    }

    pub fn into_token(self) -> String {
        self.token
    }
}

/// Signs tokens per role policy and records them as live
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    key: Arc<SigningKey>,
    policy: RolePolicy,
    cache: Arc<LivenessCache<TokenPayload>>,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(
        key: Arc<SigningKey>,
        policy: RolePolicy,
        cache: Arc<LivenessCache<TokenPayload>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TokenIssuer {
            key,
            policy,
            cache,
            clock,
        }
    }

    /// Issue a token for `principal` with the lifetime configured for `role`
    pub fn issue(&self, principal: &Principal, role: Role) -> Result<IssuedToken, TokenError> {
        let ttl = self.policy.ttl(role)?;

        let issued_at = self.clock.now_unix();
        let expires_at = issued_at.saturating_add(ttl.as_secs());

        let mut claims = Claims::with_custom_claims(RoleClaim { role }, JwtDuration::from_secs(ttl.as_secs()))
            .with_subject(principal.as_str());
        claims.issued_at = Some(JwtDuration::from_secs(issued_at));
        claims.expires_at = Some(JwtDuration::from_secs(expires_at));
        claims.invalid_before = None;

        let token = self.key.sign(claims)?;
        let payload = TokenPayload {
            subject: principal.clone(),
            role,
            issued_at,
            expires_at,
        };

        self.cache.put(token.clone(), payload.clone());
        debug!("Issued {} token for {}, expires at {}", role, principal, expires_at);

        Ok(IssuedToken { token, payload })
    }

    /// How long a token for `role` stays valid: its own TTL, capped by the
    /// liveness cache lifetime
    pub fn effective_lifetime(&self, role: Role) -> Result<Duration, TokenError> {
        Ok(self.policy.ttl(role)?.min(self.cache.ttl()))
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }
}

/// Checks presented tokens. Never reports why a token is invalid.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    key: Arc<SigningKey>,
    cache: Arc<LivenessCache<TokenPayload>>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(
        key: Arc<SigningKey>,
        cache: Arc<LivenessCache<TokenPayload>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        TokenValidator { key, cache, clock }
    }

    /// Signature, algorithm and expiry must hold before the cache is consulted
    pub fn is_valid(&self, token: &str) -> bool {
        let now = self.clock.now_unix();
        let options = VerificationOptions {
            time_tolerance: Some(JwtDuration::from_secs(0)),
            artificial_time: Some(JwtDuration::from_secs(now)),
            ..Default::default()
        };

        let claims = match self.key.verify::<RoleClaim>(token, options) {
            Ok(claims) => claims,
            Err(reason) => {
                warn!("Token verification failed: {}", reason);
                return false;
            }
        };

        match claims.expires_at {
            Some(exp) if exp.as_secs() > now => {}
            Some(_) => {
                warn!("Token verification failed: token has expired");
                return false;
            }
            None => {
                warn!("Token verification failed: missing expiry claim");
                return false;
            }
        }

        let live = self.cache.contains(token);
        if !live {
            debug!("Token for {:?} is not in the liveness cache", claims.subject);
        }
        live
    }
}

/// Read a token's payload without checking its signature. Only for
/// inspection; never use the result for an access decision.
pub fn decode_unverified(token: &str) -> Result<TokenPayload, TokenError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(body), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments".to_string()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(body)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}
