use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_auth::{GlobalRole, IssuedToken, ProjectMembership, ProjectRole, UserRecord};
use tessera_core::{ProjectId, UserId};
use tessera_infra::Project;

// -------------------------
// Request DTOs
// -------------------------

/// Missing fields deserialize as empty so the handler can answer 400 itself.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

/// `user_id` is validated by the handler, like the path parameter form.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: String,
    pub role: ProjectRole,
}

// -------------------------
// Response DTOs
// -------------------------

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: GlobalRole,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            status: user.status.as_str(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: LoginUser,
}

/// The identity the token was issued for.
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: UserId,
    pub email: String,
    pub role: GlobalRole,
}

impl From<IssuedToken> for LoginResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.claims.expires_at,
            user: LoginUser {
                id: issued.claims.user_id,
                email: issued.claims.email,
                role: issued.claims.role,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
}

impl From<ProjectMembership> for MembershipResponse {
    fn from(m: ProjectMembership) -> Self {
        Self {
            project_id: m.project_id,
            user_id: m.user_id,
            role: m.role,
        }
    }
}
