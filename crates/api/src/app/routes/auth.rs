use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;

use tessera_auth::Registration;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> Response {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "email and password are required",
        );
    }

    match services.auth.login(&body.email, &body.password, Utc::now()).await {
        Ok(issued) => (StatusCode::OK, Json(dto::LoginResponse::from(issued))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> Response {
    let input = Registration {
        email: body.email,
        password: body.password,
        name: body.name,
    };

    match services.auth.register(input).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({ "user": dto::UserResponse::from(&user) })),
        )
            .into_response(),
        Err(e) => errors::registration_error_to_response(e),
    }
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> Response {
    (StatusCode::OK, Json(json!({ "message": "logged out" }))).into_response()
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Response {
    match services.auth.current_user(principal.claims()).await {
        Ok(user) => (StatusCode::OK, Json(json!({ "user": dto::UserResponse::from(&user) }))).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
