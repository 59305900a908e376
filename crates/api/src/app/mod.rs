//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and auth service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over already-wired services.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        auth: services.auth.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

/// Wire services from config and build the router (entrypoint used by `main.rs`).
pub async fn build_app_from_config(config: &ApiConfig) -> Result<Router, services::ServiceError> {
    let services = services::build_services(config).await?;
    Ok(build_app(Arc::new(services)))
}

pub use services::AppServices;
