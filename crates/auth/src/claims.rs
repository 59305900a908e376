use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_core::UserId;

use crate::GlobalRole;

/// Identity claims supplied when issuing a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub user_id: UserId,
    pub email: String,
    pub role: GlobalRole,
}

/// Claims recovered from a verified token.
///
/// `role` reflects the identity's role at issuance time; it is not refreshed
/// against the live record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject / user identifier.
    pub user_id: UserId,

    pub email: String,

    /// Global role granted at issuance.
    pub role: GlobalRole,

    /// Issued-at timestamp (whole seconds).
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp (whole seconds).
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn identity(&self) -> IdentityClaims {
        IdentityClaims {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        expired(self.expires_at.timestamp(), now)
    }
}

/// A token is dead from its `exp` second onwards.
pub(crate) fn expired(expires_at_secs: i64, now: DateTime<Utc>) -> bool {
    now.timestamp() >= expires_at_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn expiry_boundary_is_exclusive() {
        let exp = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let claims = Claims {
            user_id: UserId::parse("u-1").unwrap(),
            email: "a@example.com".into(),
            role: GlobalRole::Employee,
            issued_at: exp - Duration::hours(1),
            expires_at: exp,
        };

        assert!(claims.is_expired_at(exp));
        assert!(claims.is_expired_at(exp + Duration::seconds(1)));
        assert!(!claims.is_expired_at(exp - Duration::seconds(1)));
        assert!(!claims.is_expired_at(exp - Duration::milliseconds(500)));
    }
}
