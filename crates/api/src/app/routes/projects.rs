use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};

use tessera_core::{ProjectId, UserId};
use tessera_infra::NewProject;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/:id", get(get_project))
        .route("/:id/members", post(add_member))
        .route("/:id/members/:user_id", delete(remove_member))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<dto::CreateProjectRequest>,
) -> Response {
    let principal = principal.map(|Extension(p)| p);
    if let Err(resp) = authz::require(&services.authz, principal.as_ref(), None, &authz::CREATE_PROJECT).await {
        return resp;
    }
    let Some(principal) = principal else {
        return errors::authz_error_to_response(tessera_auth::AuthzError::Unauthenticated);
    };

    let name = body.name.trim();
    if name.is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "project name is required");
    }
    let description = body.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

    let new_project = NewProject {
        name: name.to_string(),
        description,
    };
    match services.registry.create_project(new_project, principal.user_id()).await {
        Ok(project) => {
            tracing::info!(project_id = %project.id, owner = %principal.user_id(), "project created");
            (StatusCode::CREATED, Json(dto::ProjectResponse::from(project))).into_response()
        }
        Err(e) => errors::registry_error_to_response(e),
    }
}

/// Projects the caller is a member of. Global roles do not widen this list.
pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.registry.list_projects_for_user(principal.user_id()).await {
        Ok(projects) => (
            StatusCode::OK,
            Json(dto::ProjectListResponse {
                projects: projects.into_iter().map(dto::ProjectResponse::from).collect(),
            }),
        )
            .into_response(),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(id): Path<String>,
) -> Response {
    let project_id = match parse_project_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let principal = principal.map(|Extension(p)| p);
    if let Err(resp) = authz::require(
        &services.authz,
        principal.as_ref(),
        Some(&project_id),
        &authz::VIEW_PROJECT,
    )
    .await
    {
        return resp;
    }

    match services.registry.get_project(&project_id).await {
        Ok(Some(project)) => (StatusCode::OK, Json(dto::ProjectResponse::from(project))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "project_not_found", "project not found"),
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddMemberRequest>,
) -> Response {
    let project_id = match parse_project_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(&body.user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let principal = principal.map(|Extension(p)| p);
    let grant = match authz::require(
        &services.authz,
        principal.as_ref(),
        Some(&project_id),
        &authz::MANAGE_MEMBERS,
    )
    .await
    {
        Ok(g) => g,
        Err(resp) => return resp,
    };

    match services
        .registry
        .upsert_member(&project_id, &user_id, body.role)
        .await
    {
        Ok(membership) => {
            tracing::info!(
                project_id = %project_id,
                user_id = %membership.user_id,
                role = %membership.role,
                ?grant,
                "project member set"
            );
            (StatusCode::OK, Json(dto::MembershipResponse::from(membership))).into_response()
        }
        Err(e) => errors::registry_error_to_response(e),
    }
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path((id, user_id)): Path<(String, String)>,
) -> Response {
    let project_id = match parse_project_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(&user_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let principal = principal.map(|Extension(p)| p);
    if let Err(resp) = authz::require(
        &services.authz,
        principal.as_ref(),
        Some(&project_id),
        &authz::MANAGE_MEMBERS,
    )
    .await
    {
        return resp;
    }

    match services.registry.remove_member(&project_id, &user_id).await {
        Ok(true) => {
            tracing::info!(project_id = %project_id, user_id = %user_id, "project member removed");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "membership_not_found", "membership not found"),
        Err(e) => errors::registry_error_to_response(e),
    }
}

fn parse_project_id(raw: &str) -> Result<ProjectId, Response> {
    ProjectId::parse(raw)
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid project id"))
}

fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    UserId::parse(raw).map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}
