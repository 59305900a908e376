use tessera_auth::{Claims, GlobalRole};
use tessera_core::UserId;

/// Principal context for a request (verified token claims).
///
/// Inserted by the auth middleware; handlers behind it can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: Claims,
}

impl PrincipalContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> &UserId {
        &self.claims.user_id
    }

    pub fn email(&self) -> &str {
        &self.claims.email
    }

    /// Global role as of token issuance.
    pub fn role(&self) -> GlobalRole {
        self.claims.role
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
