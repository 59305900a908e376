//! Login, request authentication and registration.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::directory::{NewUser, StoreError, UserDirectory, UserRecord, UserStatus, normalize_email};
use crate::password::{CredentialError, CredentialVerifier};
use crate::token::{IssuedToken, TokenCodec, TokenError};
use crate::{Claims, GlobalRole, IdentityClaims};

/// Default token lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Role given to self-registered accounts.
pub const DEFAULT_REGISTRATION_ROLE: GlobalRole = GlobalRole::Employee;

pub const MIN_PASSWORD_LEN: usize = 8;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    /// Unknown email, wrong password, no password set and suspended account
    /// all end up here.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The inner reason is for logs and tests only.
    #[error("invalid token")]
    InvalidToken(#[source] TokenError),

    /// The token is valid but its subject no longer exists.
    #[error("user not found")]
    UnknownUser,

    #[error("identity store unavailable")]
    Unavailable,

    #[error("internal error")]
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registration is the one place allowed to reveal that an email exists.
    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("identity store unavailable")]
    Unavailable,

    #[error("internal error")]
    Internal,
}

/// Input to [`AuthenticationService::register`].
#[derive(Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Orchestrates credential checks and token handling.
///
/// Holds no mutable state; share it behind an `Arc`.
pub struct AuthenticationService {
    users: Arc<dyn UserDirectory>,
    codec: Arc<dyn TokenCodec>,
    verifier: CredentialVerifier,
    token_ttl: Duration,
}

impl AuthenticationService {
    pub fn new(users: Arc<dyn UserDirectory>, codec: Arc<dyn TokenCodec>, verifier: CredentialVerifier) -> Self {
        Self {
            users,
            codec,
            verifier,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// Exchange email + password for a signed token.
    pub async fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            info!(reason = "empty_input", "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.users.find_user_by_email(&email).await.map_err(|e| {
            warn!(error = %e, "user lookup failed during login");
            AuthError::Unavailable
        })?;

        let plaintext = password.to_string();
        let Some(user) = user else {
            self.with_verifier(move |v| v.equalize(&plaintext))
                .await
                .map_err(|e| join_failed(e, "login"))?;
            info!(email = %email, reason = "unknown_email", "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let stored_hash = user.password_hash.clone();
        let checked = self
            .with_verifier(move |v| {
                let checked = v.check(&plaintext, stored_hash.as_deref());
                if checked == Err(CredentialError::MissingHash) {
                    v.equalize(&plaintext);
                }
                checked
            })
            .await
            .map_err(|e| join_failed(e, "login"))?;

        if let Err(e) = checked {
            let reason = match e {
                CredentialError::MissingHash => "no_password",
                CredentialError::Mismatch => "wrong_password",
                CredentialError::Hashing(_) => "hash_error",
            };
            info!(email = %email, reason, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if user.status == UserStatus::Suspended {
            info!(email = %email, reason = "suspended", "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self
            .codec
            .issue(&IdentityClaims::from(&user), self.token_ttl, now)
            .map_err(|e| {
                error!(error = %e, "token issuance failed");
                AuthError::Internal
            })?;

        info!(user_id = %user.id, "login succeeded");
        Ok(issued)
    }

    /// Authenticate a request from its raw `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let token = extract_bearer(header)?;

        self.codec.verify(token, now).map_err(|e| {
            debug!(reason = %e, "token rejected");
            AuthError::InvalidToken(e)
        })
    }

    /// Re-read the live record behind authenticated claims.
    pub async fn current_user(&self, claims: &Claims) -> Result<UserRecord, AuthError> {
        match self.users.find_user_by_id(&claims.user_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AuthError::UnknownUser),
            Err(e) => {
                warn!(error = %e, "user lookup failed");
                Err(AuthError::Unavailable)
            }
        }
    }

    /// Create a password account with the default role.
    pub async fn register(&self, input: Registration) -> Result<UserRecord, RegistrationError> {
        let email = normalize_email(&input.email);
        let name = input.name.trim().to_string();
        validate_registration(&email, &input.password, &name)?;

        let existing = self.users.find_user_by_email(&email).await.map_err(|e| {
            warn!(error = %e, "user lookup failed during registration");
            RegistrationError::Unavailable
        })?;
        if existing.is_some() {
            return Err(RegistrationError::EmailTaken);
        }

        let plaintext = input.password;
        let password_hash = self
            .with_verifier(move |v| v.hash(&plaintext))
            .await
            .map_err(|e| {
                error!(error = %e, "password hashing task failed");
                RegistrationError::Internal
            })?
            .map_err(|e| {
                error!(error = %e, "password hashing failed");
                RegistrationError::Internal
            })?;

        let user = self
            .users
            .create_user(NewUser {
                email,
                name,
                role: DEFAULT_REGISTRATION_ROLE,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => RegistrationError::EmailTaken,
                other => {
                    warn!(error = %other, "user insert failed");
                    RegistrationError::Unavailable
                }
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }
}

impl AuthenticationService {
    /// Run bcrypt work on the blocking pool so it never stalls the executor.
    async fn with_verifier<T, F>(&self, work: F) -> Result<T, tokio::task::JoinError>
    where
        F: FnOnce(&CredentialVerifier) -> T + Send + 'static,
        T: Send + 'static,
    {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || work(&verifier)).await
    }
}

fn join_failed(err: tokio::task::JoinError, operation: &'static str) -> AuthError {
    error!(error = %err, operation, "password task failed");
    AuthError::Internal
}

fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    // Scheme names are case-insensitive.
    let token = header
        .and_then(|h| h.split_at_checked(BEARER_PREFIX.len()))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case(BEARER_PREFIX))
        .map(|(_, rest)| rest.trim())
        .ok_or(AuthError::MissingCredentials)?;

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(token)
}

fn validate_registration(email: &str, password: &str, name: &str) -> Result<(), RegistrationError> {
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err(RegistrationError::Validation("email, password and name are required".into()));
    }
    if !email.contains('@') {
        return Err(RegistrationError::Validation("invalid email format".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RegistrationError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
