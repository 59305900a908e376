//! Process configuration, read once at startup from the environment.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use tessera_auth::password::DEFAULT_COST;
use tessera_auth::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_TOKEN_TTL_SECS, SecretError, SigningSecret};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// One year.
const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set")]
    MissingSecret,

    #[error("JWT_SECRET is invalid: {0}")]
    Secret(#[from] SecretError),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together")]
    PartialBootstrapAdmin,
}

/// Optional first administrator, created at startup if absent.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub signing_secret: SigningSecret,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub membership_lookup_timeout: Duration,
    pub database_url: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests inject a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::MissingSecret)?;
        let signing_secret = SigningSecret::new(secret.into_bytes())?;

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let ttl_secs = parse_or("TOKEN_TTL_SECS", &lookup, DEFAULT_TOKEN_TTL_SECS)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_SECS",
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_SECS}"),
            });
        }
        let token_ttl = chrono::Duration::try_seconds(ttl_secs).ok_or(ConfigError::Invalid {
            key: "TOKEN_TTL_SECS",
            reason: "out of range".into(),
        })?;

        let bcrypt_cost = parse_or("BCRYPT_COST", &lookup, DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".into(),
            });
        }

        let timeout_ms = parse_or(
            "MEMBERSHIP_LOOKUP_TIMEOUT_MS",
            &lookup,
            DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "MEMBERSHIP_LOOKUP_TIMEOUT_MS",
                reason: "must be positive".into(),
            });
        }

        let bootstrap_admin = match (lookup("BOOTSTRAP_ADMIN_EMAIL"), lookup("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: lookup("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialBootstrapAdmin),
        };

        Ok(Self {
            bind_addr,
            signing_secret,
            token_ttl,
            bcrypt_cost,
            membership_lookup_timeout: Duration::from_millis(timeout_ms),
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            bootstrap_admin,
        })
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}
