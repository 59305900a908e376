use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use tessera_auth::AuthenticationService;

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthenticationService>,
}

/// Require a valid bearer token; attaches a [`PrincipalContext`] on success.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let header = authorization_header(req.headers());

    let claims = state
        .auth
        .authenticate(header, Utc::now())
        .map_err(errors::auth_error_to_response)?;

    tracing::debug!(user_id = %claims.user_id, path = %req.uri().path(), "request authenticated");
    req.extensions_mut().insert(PrincipalContext::new(claims));

    Ok(next.run(req).await)
}

/// A header that is not valid ASCII is treated like an absent one.
fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}
