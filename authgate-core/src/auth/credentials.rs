//! Credential store
//!
//! Principals and their secrets are read once at startup from a line-oriented
//! `principal=secret` source. The first four characters of each principal
//! select its role. Nothing is added or removed afterwards.

use crate::{ConfigError, CredentialRecord, Principal, Role};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Length of the random suffix appended to generated principals
pub const GENERATED_PRINCIPAL_SUFFIX_LEN: usize = 6;
/// Length of generated secrets
pub const GENERATED_SECRET_LEN: usize = 21;

/// Immutable principal -> credential mapping
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    records: HashMap<Principal, CredentialRecord>,
}

impl CredentialStore {
    /// Load credentials from a file. Fails if the file cannot be read or a
    /// principal carries an unmapped role prefix.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading credentials from {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::CredentialSourceUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let store = Self::parse(&contents)?;
        info!("Loaded {} credentials", store.len());
        Ok(store)
    }

    /// Parse credential lines. Lines without `=` are skipped.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut records = HashMap::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let Some((principal, secret)) = line.split_once('=') else {
                warn!("Skipping credential line {}: no '=' separator", line_no);
                continue;
            };

            let principal = Principal::new(principal);
            let role = principal
                .role_prefix()
                .and_then(Role::from_prefix)
                .ok_or_else(|| ConfigError::UnknownRolePrefix {
                    prefix: principal.role_prefix().unwrap_or(principal.as_str()).to_string(),
                    line: line_no,
                })?;

            debug!("Loaded principal {} with role {}", principal, role);
            let record = CredentialRecord {
                principal: principal.clone(),
                secret: secret.to_string(),
                role,
            };
            if records.insert(principal.clone(), record).is_some() {
                warn!("Duplicate principal {} on line {}, keeping the later entry", principal, line_no);
            }
        }

        Ok(CredentialStore { records })
    }

    pub fn get(&self, principal: &str) -> Option<&CredentialRecord> {
        self.records.get(&Principal::from(principal))
    }

    /// Role of a principal, if it is known
    pub fn role_of(&self, principal: &str) -> Option<Role> {
        self.get(principal).map(|record| record.role)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All distinct roles present in the store
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        let mut seen: Vec<Role> = self.records.values().map(|r| r.role).collect();
        seen.sort();
        seen.dedup();
        seen.into_iter()
    }

    pub fn records(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.records.values()
    }
}

fn random_alphanumeric(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate bootstrap credentials: `users_per_role` principals for every
/// role prefix, each with a random secret. Only meant for initial setup.
pub fn generate_credentials(users_per_role: usize) -> BTreeMap<String, String> {
    let mut generated = BTreeMap::new();

    for role in Role::ALL {
        let mut created = 0;
        while created < users_per_role {
            let principal = format!(
                "{}{}",
                role.prefix(),
                random_alphanumeric(GENERATED_PRINCIPAL_SUFFIX_LEN).to_uppercase()
            );
            if generated.contains_key(&principal) {
                continue;
            }
            generated.insert(principal, random_alphanumeric(GENERATED_SECRET_LEN));
            created += 1;
        }
    }

    generated
}

/// Write credentials as sorted `principal=secret` lines
pub fn write_credentials(
    credentials: &BTreeMap<String, String>,
    path: impl AsRef<Path>,
) -> Result<(), ConfigError> {
    let mut file = std::fs::File::create(path.as_ref())?;
    for (principal, secret) in credentials {
        writeln!(file, "{}={}", principal, secret)?;
    }
    file.flush()?;
    Ok(())
}
