//! Authentication and token lifecycle for authgate
//!
//! This module implements:
//! - Credential loading and constant-time password verification
//! - Role policy (per-role token TTL, login-surface gating)
//! - HMAC-signed bearer tokens backed by a liveness cache

pub mod cache;
pub mod credentials;
pub mod engine;
pub mod keys;
pub mod policy;
pub mod timing;
pub mod tokens;
pub mod verifier;

pub use cache::*;
pub use credentials::*;
pub use engine::*;
pub use keys::*;
pub use policy::*;
pub use timing::*;
pub use tokens::*;
pub use verifier::*;
