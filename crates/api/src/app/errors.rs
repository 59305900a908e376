use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tessera_auth::{AuthError, AuthzError, RegistrationError};
use tessera_infra::RegistryError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::MissingCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "missing_credentials",
            "authorization bearer token required",
        ),
        AuthError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
        AuthError::InvalidToken(_) => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_token", "invalid or expired token")
        }
        AuthError::UnknownUser => json_error(StatusCode::NOT_FOUND, "user_not_found", "user not found"),
        AuthError::Unavailable => unavailable(),
        AuthError::Internal => internal("authentication failed unexpectedly"),
    }
}

pub fn registration_error_to_response(err: RegistrationError) -> axum::response::Response {
    match err {
        RegistrationError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        RegistrationError::EmailTaken => json_error(
            StatusCode::CONFLICT,
            "email_taken",
            "an account with this email already exists",
        ),
        RegistrationError::Unavailable => unavailable(),
        RegistrationError::Internal => internal("registration failed unexpectedly"),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required")
        }
        AuthzError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient role"),
        AuthzError::Unavailable => unavailable(),
    }
}

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::ProjectNotFound => {
            json_error(StatusCode::NOT_FOUND, "project_not_found", "project not found")
        }
        RegistryError::UserNotFound => json_error(StatusCode::NOT_FOUND, "user_not_found", "user not found"),
        RegistryError::Store(e) => {
            tracing::warn!(error = %e, "project registry call failed");
            unavailable()
        }
    }
}

fn unavailable() -> axum::response::Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "unavailable",
        "service temporarily unavailable",
    )
}

fn internal(context: &'static str) -> axum::response::Response {
    tracing::error!(context, "internal error");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
}
