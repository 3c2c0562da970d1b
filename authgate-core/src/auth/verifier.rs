//! Password verification against the credential store

use crate::auth::{constant_time_str_compare, CredentialStore};
use crate::{AuthError, Principal};
use tracing::debug;

// Compared against when the principal is unknown, so that path costs the
// same digest work as a real mismatch.
const ABSENT_SECRET: &str = "\0absent-principal\0";

/// Verify a principal/secret pair supplied as separate fields
pub fn verify_password(
    principal: &str,
    supplied_secret: &str,
    store: &CredentialStore,
) -> Result<(), AuthError> {
    debug!("Verifying password for principal {}", principal);

    let result = check(principal, supplied_secret, store);
    if let Err(err) = &result {
        debug!(
            "Password verification for {} failed: {}",
            principal,
            err.diagnostic_code()
        );
    }
    result
}

/// Verify credentials decoded from a challenge such as an HTTP Basic header.
/// Returns the authenticated principal.
pub fn verify_challenge(
    principal: &str,
    supplied_secret: &str,
    store: &CredentialStore,
) -> Result<Principal, AuthError> {
    debug!("Verifying challenge credentials for principal {}", principal);

    match check(principal, supplied_secret, store) {
        Ok(()) => Ok(Principal::from(principal)),
        Err(err) => {
            debug!(
                "Challenge verification for {} failed: {}",
                principal,
                err.diagnostic_code()
            );
            Err(err)
        }
    }
}

fn check(principal: &str, supplied_secret: &str, store: &CredentialStore) -> Result<(), AuthError> {
    let Some(record) = store.get(principal) else {
        std::hint::black_box(constant_time_str_compare(
            std::hint::black_box(supplied_secret),
            ABSENT_SECRET,
        ));
        return Err(AuthError::UnknownPrincipal);
    };

    if record.secret.is_empty() {
        return Err(AuthError::NoSecretConfigured);
    }

    if !constant_time_str_compare(supplied_secret, &record.secret) {
        return Err(AuthError::SecretMismatch);
    }

    Ok(())
}
