//! Startup configuration for the token engine
//!
//! Values come from the process environment first, then from an optional
//! `settings.env`-style file of `KEY=value` lines.

use crate::auth::{SigningAlgorithm, MIN_SECRET_LEN};
use crate::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const ENV_SECRET_KEY: &str = "SECRET_KEY";
pub const ENV_ALGORITHM: &str = "JWT_ALGORITHM";
pub const ENV_CACHE_SIZE: &str = "TOKEN_CACHE_SIZE";
pub const ENV_CACHE_TTL: &str = "TOKEN_TTL_SECONDS";

pub const DEFAULT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Signing and liveness-cache settings
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Shared HMAC secret. `None` means a random per-process key.
    pub signing_key: Option<String>,
    pub algorithm: SigningAlgorithm,
    pub cache_capacity: usize,
    /// Uniform lifetime of every liveness cache entry
    pub cache_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            signing_key: None,
            algorithm: SigningAlgorithm::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("algorithm", &self.algorithm)
            .field("cache_capacity", &self.cache_capacity)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl AuthConfig {
    /// Load from the environment, falling back to `settings_file` when given.
    /// A settings file that does not exist is treated as empty.
    pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_values = match settings_file {
            Some(path) if path.exists() => {
                info!("Loading settings from {}", path.display());
                read_settings_file(path)?
            }
            Some(path) => {
                debug!("Settings file {} not found, using environment only", path.display());
                HashMap::new()
            }
            None => HashMap::new(),
        };

        Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file_values.get(name).cloned())
        })
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AuthConfig::default();

        if let Some(key) = lookup(ENV_SECRET_KEY).filter(|k| !k.is_empty()) {
            check_secret_len(&key)?;
            config.signing_key = Some(key);
        }

        if let Some(value) = lookup(ENV_ALGORITHM) {
            config.algorithm = value.parse().map_err(|_| ConfigError::InvalidSetting {
                name: ENV_ALGORITHM,
                value: value.clone(),
                reason: "expected HS256, HS384 or HS512".to_string(),
            })?;
        }

        if let Some(value) = lookup(ENV_CACHE_SIZE) {
            let capacity = parse_number(ENV_CACHE_SIZE, &value)?;
            if capacity == 0 {
                return Err(ConfigError::InvalidSetting {
                    name: ENV_CACHE_SIZE,
                    value,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.cache_capacity = capacity as usize;
        }

        if let Some(value) = lookup(ENV_CACHE_TTL) {
            let seconds = parse_number(ENV_CACHE_TTL, &value)?;
            if seconds == 0 {
                return Err(ConfigError::InvalidSetting {
                    name: ENV_CACHE_TTL,
                    value,
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config.cache_ttl = Duration::from_secs(seconds);
        }

        Ok(config)
    }
}

/// jwt-simple refuses HMAC keys below [`MIN_SECRET_LEN`] bytes. The secret
/// itself never goes into the error.
pub(crate) fn check_secret_len(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::InvalidSetting {
            name: ENV_SECRET_KEY,
            value: "<redacted>".to_string(),
            reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
        });
    }
    Ok(())
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn read_settings_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(parse_settings(&contents))
}

fn parse_settings(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}
