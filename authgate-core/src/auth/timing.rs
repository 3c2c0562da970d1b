//! Constant-time comparison operations
//!
//! Secrets are compared through fixed-size SHA-256 digests so that neither
//! the position of the first differing byte nor the length of either input
//! changes how long a comparison takes.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Constant-time hash comparison
pub fn constant_time_hash_compare(hash1: &[u8; 32], hash2: &[u8; 32]) -> bool {
    hash1.ct_eq(hash2).into()
}

/// Constant-time comparison of two secrets of arbitrary length
pub fn constant_time_secret_compare(supplied: &[u8], stored: &[u8]) -> bool {
    let supplied_digest: [u8; 32] = Sha256::digest(supplied).into();
    let stored_digest: [u8; 32] = Sha256::digest(stored).into();

    constant_time_hash_compare(&supplied_digest, &stored_digest)
}

/// Constant-time string comparison (for passwords, etc.)
pub fn constant_time_str_compare(supplied: &str, stored: &str) -> bool {
    constant_time_secret_compare(supplied.as_bytes(), stored.as_bytes())
}
