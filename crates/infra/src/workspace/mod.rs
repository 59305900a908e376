//! Workspace persistence: users, projects, project memberships.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use tessera_auth::{ProjectMembership, ProjectRole, StoreError};
use tessera_core::{ProjectId, UserId};

pub use in_memory::InMemoryWorkspace;
pub use postgres::PostgresWorkspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("project not found")]
    ProjectNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Project-management collaborator: owns projects and membership writes.
///
/// The auth core never calls this; it only reads memberships through
/// `MembershipDirectory`.
#[async_trait]
pub trait ProjectRegistry: Send + Sync {
    /// Create a project and make `owner` its `OWNER` in one step.
    async fn create_project(&self, project: NewProject, owner: &UserId) -> Result<Project, RegistryError>;

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, RegistryError>;

    /// Projects the user holds any membership on, oldest first.
    async fn list_projects_for_user(&self, user_id: &UserId) -> Result<Vec<Project>, RegistryError>;

    /// Insert or replace the `(user, project)` membership.
    async fn upsert_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: ProjectRole,
    ) -> Result<ProjectMembership, RegistryError>;

    /// Returns `false` when there was nothing to remove.
    async fn remove_member(&self, project_id: &ProjectId, user_id: &UserId) -> Result<bool, RegistryError>;
}
