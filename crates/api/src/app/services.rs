//! Service wiring: store selection, auth services, admin bootstrap.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use tessera_auth::{
    AuthenticationService, AuthorizationEngine, CredentialError, CredentialVerifier, GlobalRole,
    Hs256TokenCodec, MembershipDirectory, NewUser, StoreError, TokenCodec, UserDirectory, normalize_email,
};
use tessera_infra::{InMemoryWorkspace, PostgresWorkspace, ProjectRegistry};

use crate::config::{ApiConfig, BootstrapAdmin};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("password hashing setup failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("failed to connect to Postgres: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub auth: Arc<AuthenticationService>,
    pub authz: Arc<AuthorizationEngine>,
    pub registry: Arc<dyn ProjectRegistry>,
}

impl AppServices {
    /// Wire the services over one store that backs users, memberships and projects.
    pub fn from_store<S>(store: Arc<S>, config: &ApiConfig) -> Result<Self, ServiceError>
    where
        S: UserDirectory + MembershipDirectory + ProjectRegistry + 'static,
    {
        let codec: Arc<dyn TokenCodec> = Arc::new(Hs256TokenCodec::new(config.signing_secret.clone()));
        let verifier = CredentialVerifier::new(config.bcrypt_cost)?;

        let users: Arc<dyn UserDirectory> = store.clone();
        let memberships: Arc<dyn MembershipDirectory> = store.clone();

        let auth = AuthenticationService::new(users, codec, verifier).with_token_ttl(config.token_ttl);
        let authz = AuthorizationEngine::new(memberships).with_lookup_timeout(config.membership_lookup_timeout);

        Ok(Self {
            auth: Arc::new(auth),
            authz: Arc::new(authz),
            registry: store,
        })
    }
}

/// Pick the store from config (Postgres when `DATABASE_URL` is set) and seed
/// the bootstrap admin if one is configured.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, ServiceError> {
    let services = match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await?;
            let store = Arc::new(PostgresWorkspace::new(pool));
            store.migrate().await?;
            tracing::info!(store = "postgres", "workspace store ready");
            let services = AppServices::from_store(store.clone(), config)?;
            if let Some(admin) = &config.bootstrap_admin {
                ensure_admin(store.as_ref(), services.auth.verifier(), admin).await?;
            }
            services
        }
        None => {
            let store = Arc::new(InMemoryWorkspace::new());
            tracing::info!(store = "in_memory", "workspace store ready");
            let services = AppServices::from_store(store.clone(), config)?;
            if let Some(admin) = &config.bootstrap_admin {
                ensure_admin(store.as_ref(), services.auth.verifier(), admin).await?;
            }
            services
        }
    };
    Ok(services)
}

/// Create the configured administrator unless the email is already taken.
///
/// An existing account is left untouched, whatever its role.
pub async fn ensure_admin(
    users: &dyn UserDirectory,
    verifier: &CredentialVerifier,
    admin: &BootstrapAdmin,
) -> Result<bool, ServiceError> {
    let email = normalize_email(&admin.email);
    if let Some(existing) = users.find_user_by_email(&email).await? {
        tracing::info!(user_id = %existing.id, "bootstrap admin already present");
        return Ok(false);
    }

    let (hasher, plaintext) = (verifier.clone(), admin.password.clone());
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await??;

    let user = users
        .create_user(NewUser {
            email,
            name: admin.name.clone(),
            role: GlobalRole::Admin,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = %user.id, "bootstrap admin created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            email: " Root@Example.com ".into(),
            password: "rootpass123".into(),
            name: "Root".into(),
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let store = InMemoryWorkspace::new();
        let verifier = CredentialVerifier::new(4).unwrap();

        assert!(ensure_admin(&store, &verifier, &admin()).await.unwrap());
        assert!(!ensure_admin(&store, &verifier, &admin()).await.unwrap());

        let user = store.find_user_by_email("root@example.com").await.unwrap().unwrap();
        assert_eq!(user.role, GlobalRole::Admin);
        assert!(verifier.verify("rootpass123", user.password_hash.as_deref()));
    }
}
