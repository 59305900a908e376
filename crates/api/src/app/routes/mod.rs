use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod projects;
pub mod system;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
}

/// Endpoints behind the bearer-token middleware.
pub fn protected_router() -> Router {
    Router::new()
        .route("/auth/me", get(auth::me))
        .nest("/projects", projects::router())
}
