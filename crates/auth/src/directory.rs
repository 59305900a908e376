//! Read-only collaborator boundary: user and membership lookups.
//!
//! Persistence is owned elsewhere (see `tessera-infra`); the auth core only
//! sees these traits. Every call is a single idempotent read, safe to retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_core::{ProjectId, UserId};

use crate::{GlobalRole, IdentityClaims, ProjectRole};

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// User is active and can authenticate.
    #[default]
    Active,
    /// User is suspended and cannot authenticate.
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Suspended => "SUSPENDED",
        }
    }
}

/// A persisted identity together with its credential.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: GlobalRole,
    pub status: UserStatus,
    /// bcrypt hash; `None` when no password has been set.
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("has_password", &self.password_hash.is_some())
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl From<&UserRecord> for IdentityClaims {
    fn from(user: &UserRecord) -> Self {
        IdentityClaims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Insert payload for a new user; the store assigns `id` and `created_at`.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: GlobalRole,
    pub password_hash: String,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// A user's role within one project. `(user_id, project_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Identity lookups (and the one write registration needs).
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `email` is already normalized by the caller.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;
}

/// Project membership lookups.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn find_membership(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<ProjectMembership>, StoreError>;
}

/// Canonical form used for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
