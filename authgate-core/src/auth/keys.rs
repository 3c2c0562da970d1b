//! HMAC signing keys
//!
//! Tokens are signed with one process-wide symmetric key. The algorithm is
//! fixed at startup; a token carrying any other algorithm never verifies.

use crate::TokenError;
use jwt_simple::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of generated keys
pub const GENERATED_KEY_LEN: usize = 32;
/// Shortest configured secret jwt-simple will sign or verify with
pub const MIN_SECRET_LEN: usize = 12;

/// Supported token signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::HS384 => "HS384",
            SigningAlgorithm::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::HS256),
            "HS384" => Ok(SigningAlgorithm::HS384),
            "HS512" => Ok(SigningAlgorithm::HS512),
            other => Err(format!("unsupported algorithm: {}", other)),
        }
    }
}

/// Process-wide token signing key
#[derive(Clone)]
pub enum SigningKey {
    HS256(HS256Key),
    HS384(HS384Key),
    HS512(HS512Key),
}

impl SigningKey {
    /// Create a key from a configured secret. Secrets shorter than
    /// [`MIN_SECRET_LEN`] produce a key that refuses to sign.
    pub fn from_secret(algorithm: SigningAlgorithm, secret: &[u8]) -> Self {
        match algorithm {
            SigningAlgorithm::HS256 => SigningKey::HS256(HS256Key::from_bytes(secret)),
            SigningAlgorithm::HS384 => SigningKey::HS384(HS384Key::from_bytes(secret)),
            SigningAlgorithm::HS512 => SigningKey::HS512(HS512Key::from_bytes(secret)),
        }
    }

    /// Create a random key that only this process knows
    pub fn generate(algorithm: SigningAlgorithm) -> Self {
        let mut secret = [0u8; GENERATED_KEY_LEN];
        OsRng.fill_bytes(&mut secret);
        Self::from_secret(algorithm, &secret)
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            SigningKey::HS256(_) => SigningAlgorithm::HS256,
            SigningKey::HS384(_) => SigningAlgorithm::HS384,
            SigningKey::HS512(_) => SigningAlgorithm::HS512,
        }
    }

    /// Sign claims into a compact token
    pub fn sign<C>(&self, claims: JWTClaims<C>) -> Result<String, TokenError>
    where
        C: Serialize + DeserializeOwned,
    {
        let signed = match self {
            SigningKey::HS256(key) => key.authenticate(claims),
            SigningKey::HS384(key) => key.authenticate(claims),
            SigningKey::HS512(key) => key.authenticate(claims),
        };
        signed.map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Check signature, algorithm and time claims. The error is a
    /// human-readable reason meant for logs.
    pub fn verify<C>(
        &self,
        token: &str,
        options: VerificationOptions,
    ) -> Result<JWTClaims<C>, String>
    where
        C: Serialize + DeserializeOwned,
    {
        let verified = match self {
            SigningKey::HS256(key) => key.verify_token::<C>(token, Some(options)),
            SigningKey::HS384(key) => key.verify_token::<C>(token, Some(options)),
            SigningKey::HS512(key) => key.verify_token::<C>(token, Some(options)),
        };
        verified.map_err(|e| e.to_string())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
