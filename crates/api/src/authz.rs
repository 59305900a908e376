//! API-side authorization guard.
//!
//! Each protected route names an [`AccessPolicy`] here and calls [`require`]
//! before touching the registry.

use axum::response::Response;

use tessera_auth::{AccessPolicy, AuthorizationEngine, Grant, GlobalRole, ProjectRole};
use tessera_core::ProjectId;

use crate::app::errors;
use crate::context::PrincipalContext;

/// Only global roles may create projects; there is no project to be a member of yet.
pub const CREATE_PROJECT: AccessPolicy =
    AccessPolicy::global_only(&[GlobalRole::Admin, GlobalRole::ProjectManager]);

pub const VIEW_PROJECT: AccessPolicy = AccessPolicy::new(
    &[GlobalRole::Admin],
    &[ProjectRole::Owner, ProjectRole::Editor, ProjectRole::Viewer],
);

pub const MANAGE_MEMBERS: AccessPolicy = AccessPolicy::new(&[GlobalRole::Admin], &[ProjectRole::Owner]);

/// Check `policy` for the current principal, mapping a denial to its HTTP response.
pub async fn require(
    engine: &AuthorizationEngine,
    principal: Option<&PrincipalContext>,
    project: Option<&ProjectId>,
    policy: &AccessPolicy,
) -> Result<Grant, Response> {
    engine
        .authorize_request(principal.map(PrincipalContext::claims), project, policy)
        .await
        .map_err(errors::authz_error_to_response)
}
