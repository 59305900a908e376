//! Postgres-backed workspace store.
//!
//! Schema lives in `migrations/0001_workspace.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | Result |
//! |------------|----------------------|--------|
//! | Database (unique violation) | `23505` | `StoreError::Conflict` |
//! | Database (foreign key violation) | `23503` | `RegistryError::ProjectNotFound` / `UserNotFound` by constraint name |
//! | Decode / ColumnNotFound | N/A | `StoreError::Corrupt` |
//! | Io / PoolTimedOut / PoolClosed / other | N/A | `StoreError::Unavailable` |
//!
//! ## Thread Safety
//!
//! `PostgresWorkspace` is `Send + Sync`; all access goes through the SQLx pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use tessera_auth::{
    GlobalRole, MembershipDirectory, NewUser, ProjectMembership, ProjectRole, StoreError, UserDirectory,
    UserRecord, UserStatus,
};
use tessera_core::{ProjectId, UserId};

use super::{NewProject, Project, ProjectRegistry, RegistryError};

const MEMBERS_PROJECT_FK: &str = "project_members_project_id_fkey";
const MEMBERS_USER_FK: &str = "project_members_user_id_fkey";

#[derive(Debug, Clone)]
pub struct PostgresWorkspace {
    pool: Arc<PgPool>,
}

impl PostgresWorkspace {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Apply the (idempotent) schema.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

const SCHEMA: &str = include_str!("../../migrations/0001_workspace.sql");

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_)) => {
            StoreError::Corrupt(format!("failed to decode row in {}: {}", operation, decode))
        }
        other => StoreError::Unavailable(format!("{} failed: {}", operation, other)),
    }
}

fn map_registry_error(operation: &str, err: sqlx::Error) -> RegistryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23503") {
            match db_err.constraint() {
                Some(MEMBERS_PROJECT_FK) => return RegistryError::ProjectNotFound,
                Some(MEMBERS_USER_FK) => return RegistryError::UserNotFound,
                _ => {}
            }
        }
    }
    RegistryError::Store(map_sqlx_error(operation, err))
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("user_from_row", e);

    let id: String = row.try_get("id").map_err(get)?;
    let role: String = row.try_get("role").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;

    Ok(UserRecord {
        id: UserId::parse(id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        email: row.try_get("email").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        role: role
            .parse::<GlobalRole>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        status: parse_status(&status)?,
        password_hash: row.try_get("password_hash").map_err(get)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(get)?,
    })
}

fn parse_status(s: &str) -> Result<UserStatus, StoreError> {
    match s {
        "ACTIVE" => Ok(UserStatus::Active),
        "SUSPENDED" => Ok(UserStatus::Suspended),
        other => Err(StoreError::Corrupt(format!("unknown user status '{other}'"))),
    }
}

fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("project_from_row", e);
    let id: String = row.try_get("id").map_err(get)?;

    Ok(Project {
        id: ProjectId::parse(id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        name: row.try_get("name").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(get)?,
    })
}

#[async_trait]
impl UserDirectory for PostgresWorkspace {
    #[instrument(skip(self), err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, role, status, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name, role, status, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_id", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, status, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, email, name, role, status, password_hash, created_at
            "#,
        )
        .bind(UserId::new().as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(&user.password_hash)
        .bind(Utc::now())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        user_from_row(&row)
    }
}

#[async_trait]
impl MembershipDirectory for PostgresWorkspace {
    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id), err)]
    async fn find_membership(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<Option<ProjectMembership>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT role
            FROM project_members
            WHERE user_id = $1 AND project_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(project_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_membership", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let role: String = row
            .try_get("role")
            .map_err(|e| map_sqlx_error("find_membership", e))?;
        let role = role
            .parse::<ProjectRole>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        Ok(Some(ProjectMembership {
            project_id: project_id.clone(),
            user_id: user_id.clone(),
            role,
        }))
    }
}

#[async_trait]
impl ProjectRegistry for PostgresWorkspace {
    #[instrument(skip(self, project), fields(owner = %owner), err)]
    async fn create_project(&self, project: NewProject, owner: &UserId) -> Result<Project, RegistryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_registry_error("create_project", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(ProjectId::new().as_str())
        .bind(&project.name)
        .bind(&project.description)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_registry_error("create_project", e))?;
        let created = project_from_row(&row)?;

        sqlx::query(
            r#"
            INSERT INTO project_members (user_id, project_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(owner.as_str())
        .bind(created.id.as_str())
        .bind(ProjectRole::Owner.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_registry_error("create_project", e))?;

        tx.commit()
            .await
            .map_err(|e| map_registry_error("create_project", e))?;
        Ok(created)
    }

    #[instrument(skip(self), fields(project_id = %id), err)]
    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, RegistryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, created_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_registry_error("get_project", e))?;

        Ok(row.as_ref().map(project_from_row).transpose()?)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_projects_for_user(&self, user_id: &UserId) -> Result<Vec<Project>, RegistryError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.description, p.created_at
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE m.user_id = $1
            ORDER BY p.created_at ASC, p.id ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_registry_error("list_projects_for_user", e))?;

        let mut projects = Vec::with_capacity(rows.len());
        for row in &rows {
            projects.push(project_from_row(row)?);
        }
        Ok(projects)
    }

    #[instrument(skip(self), fields(project_id = %project_id, user_id = %user_id), err)]
    async fn upsert_member(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        role: ProjectRole,
    ) -> Result<ProjectMembership, RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO project_members (user_id, project_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, project_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(user_id.as_str())
        .bind(project_id.as_str())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_registry_error("upsert_member", e))?;

        Ok(ProjectMembership {
            project_id: project_id.clone(),
            user_id: user_id.clone(),
            role,
        })
    }

    #[instrument(skip(self), fields(project_id = %project_id, user_id = %user_id), err)]
    async fn remove_member(&self, project_id: &ProjectId, user_id: &UserId) -> Result<bool, RegistryError> {
        if self.get_project(project_id).await?.is_none() {
            return Err(RegistryError::ProjectNotFound);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM project_members
            WHERE user_id = $1 AND project_id = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(project_id.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_registry_error("remove_member", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_strict() {
        assert_eq!(parse_status("ACTIVE"), Ok(UserStatus::Active));
        assert_eq!(parse_status("SUSPENDED"), Ok(UserStatus::Suspended));
        assert!(matches!(parse_status("active"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn transport_errors_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("find_membership", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_registry_error("get_project", sqlx::Error::PoolClosed),
            RegistryError::Store(StoreError::Unavailable(_))
        ));
    }
}
