use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use tessera_core::ProjectId;

use crate::directory::MembershipDirectory;
use crate::{Claims, GlobalRole, ProjectRole};

/// Default bound on a single membership lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    /// No valid identity was presented.
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    /// The membership lookup failed or timed out; the decision is unknown.
    #[error("authorization temporarily unavailable")]
    Unavailable,
}

/// Static role requirements declared by a protected operation.
///
/// A caller passes if its global role is listed in `global`, or if it holds a
/// membership on the target project whose role is listed in `project`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub global: &'static [GlobalRole],
    pub project: &'static [ProjectRole],
}

impl AccessPolicy {
    pub const fn new(global: &'static [GlobalRole], project: &'static [ProjectRole]) -> Self {
        Self { global, project }
    }

    /// No project-role path (e.g. creating a project that does not exist yet).
    pub const fn global_only(global: &'static [GlobalRole]) -> Self {
        Self { global, project: &[] }
    }
}

/// Which tier granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", content = "role", rename_all = "snake_case")]
pub enum Grant {
    Global(GlobalRole),
    Project(ProjectRole),
}

/// Two-tier role check: global role first, project membership second.
///
/// - No caching: every decision re-queries membership when it is needed
/// - Membership is only consulted when the global check fails
/// - Lookup failures are `Unavailable`, never `Forbidden`
pub struct AuthorizationEngine {
    memberships: Arc<dyn MembershipDirectory>,
    lookup_timeout: Duration,
}

impl AuthorizationEngine {
    pub fn new(memberships: Arc<dyn MembershipDirectory>) -> Self {
        Self {
            memberships,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Decide for an already-authenticated identity.
    ///
    /// `project = None` marks a global-only resource.
    pub async fn authorize(
        &self,
        claims: &Claims,
        project: Option<&ProjectId>,
        policy: &AccessPolicy,
    ) -> Result<Grant, AuthzError> {
        if policy.global.contains(&claims.role) {
            tracing::debug!(user_id = %claims.user_id, role = %claims.role, "granted by global role");
            return Ok(Grant::Global(claims.role));
        }

        let Some(project_id) = project else {
            return Err(AuthzError::Forbidden);
        };
        if policy.project.is_empty() {
            return Err(AuthzError::Forbidden);
        }

        let lookup = self.memberships.find_membership(&claims.user_id, project_id);
        let membership = match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(membership)) => membership,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, project_id = %project_id, "membership lookup failed");
                return Err(AuthzError::Unavailable);
            }
            Err(_) => {
                tracing::warn!(
                    project_id = %project_id,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "membership lookup timed out"
                );
                return Err(AuthzError::Unavailable);
            }
        };

        match membership {
            Some(m) if policy.project.contains(&m.role) => {
                tracing::debug!(user_id = %claims.user_id, project_id = %project_id, role = %m.role, "granted by project role");
                Ok(Grant::Project(m.role))
            }
            _ => Err(AuthzError::Forbidden),
        }
    }

    /// Same as [`authorize`](Self::authorize), but takes the outcome of the
    /// authentication step and reports its absence as `Unauthenticated`.
    pub async fn authorize_request(
        &self,
        claims: Option<&Claims>,
        project: Option<&ProjectId>,
        policy: &AccessPolicy,
    ) -> Result<Grant, AuthzError> {
        let Some(claims) = claims else {
            return Err(AuthzError::Unauthenticated);
        };
        self.authorize(claims, project, policy).await
    }
}
