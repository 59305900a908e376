//! Compact signed identity tokens (HS256 JWT).
//!
//! Verification order is fixed: signature and structure first, then expiry,
//! then claim shape. Anything that fails before the signature has been checked
//! is reported as [`TokenError::BadSignature`] so a forger learns nothing about
//! which part of the token was wrong.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use tessera_core::UserId;

use crate::claims::expired;
use crate::{Claims, GlobalRole, IdentityClaims};

/// Shared HMAC secret, loaded once at startup.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("signing secret must not be empty")]
    Empty,
}

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SecretError::Empty);
        }
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl core::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature or structure is invalid")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token claims are malformed")]
    MalformedClaims,
}

#[derive(Debug, Error)]
pub enum IssueError {
    /// `now + ttl` is not a representable instant.
    #[error("token lifetime out of range")]
    LifetimeOutOfRange,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A freshly signed token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Issues and verifies identity tokens.
///
/// The clock is passed in so verification is a pure function of
/// `(token, now, secret)`.
pub trait TokenCodec: Send + Sync {
    fn issue(
        &self,
        identity: &IdentityClaims,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError>;

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireClaims<'a> {
    user_id: &'a str,
    email: &'a str,
    role: GlobalRole,
    iat: i64,
    exp: i64,
}

/// HMAC-SHA256 token codec.
pub struct Hs256TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenCodec {
    pub fn new(secret: SigningSecret) -> Self {
        // Expiry is checked against the caller's clock below, not the library's.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec for Hs256TokenCodec {
    fn issue(
        &self,
        identity: &IdentityClaims,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError> {
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).ok_or(IssueError::LifetimeOutOfRange)?;
        let expires_at = issued_at
            .checked_add_signed(Duration::seconds(ttl.num_seconds()))
            .ok_or(IssueError::LifetimeOutOfRange)?;
        let iat = issued_at.timestamp();
        let exp = expires_at.timestamp();

        let wire = WireClaims {
            user_id: identity.user_id.as_str(),
            email: &identity.email,
            role: identity.role,
            iat,
            exp,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)?;

        let claims = Claims {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            role: identity.role,
            issued_at,
            expires_at,
        };

        Ok(IssuedToken { token, claims })
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // Decoding into a plain JSON map means every library error happened
        // while parsing the envelope or checking the MAC.
        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding, &self.validation)
            .map_err(|_| TokenError::BadSignature)?;
        let payload = data.claims;

        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or(TokenError::MalformedClaims)?;
        if expired(exp, now) {
            return Err(TokenError::Expired);
        }

        let user_id = payload
            .get("userId")
            .and_then(Value::as_str)
            .and_then(|s| UserId::parse(s).ok())
            .ok_or(TokenError::MalformedClaims)?;
        let role = payload
            .get("role")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<GlobalRole>().ok())
            .ok_or(TokenError::MalformedClaims)?;
        let issued_at = payload
            .get("iat")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(TokenError::MalformedClaims)?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(TokenError::MalformedClaims)?;
        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Claims {
            user_id,
            email,
            role,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret-key-minimum-32-chars!!";

    fn codec() -> Hs256TokenCodec {
        Hs256TokenCodec::new(SigningSecret::new(SECRET).unwrap())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    fn identity(role: GlobalRole) -> IdentityClaims {
        IdentityClaims {
            user_id: UserId::parse("user-42").unwrap(),
            email: "alice@example.com".into(),
            role,
        }
    }

    /// Sign an arbitrary payload with the test secret.
    fn mint_raw(payload: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn tamper_signature(token: &str, index: usize, replacement: char) -> String {
        let (head, sig) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = sig.chars().collect();
        sig[index] = replacement;
        format!("{head}.{}", sig.into_iter().collect::<String>())
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(SigningSecret::new(Vec::new()).unwrap_err(), SecretError::Empty);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SigningSecret::new(SECRET).unwrap();
        assert!(!format!("{secret:?}").contains("test-secret"));
    }

    #[test]
    fn issue_then_verify_returns_claims() {
        let codec = codec();
        let issued = codec.issue(&identity(GlobalRole::Admin), Duration::days(7), t0()).unwrap();

        let claims = codec.verify(&issued.token, t0() + Duration::hours(1)).unwrap();
        assert_eq!(claims, issued.claims);
        assert_eq!(claims.user_id.as_str(), "user-42");
        assert_eq!(claims.role, GlobalRole::Admin);
        assert_eq!(claims.issued_at, t0());
        assert_eq!(claims.expires_at, t0() + Duration::days(7));
    }

    #[test]
    fn wire_format_uses_camel_case_claims() {
        let issued = codec().issue(&identity(GlobalRole::ProjectManager), Duration::minutes(5), t0()).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = jsonwebtoken::decode::<serde_json::Value>(
            &issued.token,
            &DecodingKey::from_secret(SECRET),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims["userId"], "user-42");
        assert_eq!(data.claims["role"], "PROJECT_MANAGER");
        assert_eq!(data.claims["iat"], t0().timestamp());
        assert_eq!(data.claims["exp"], t0().timestamp() + 300);
    }

    #[test]
    fn lifetime_past_the_calendar_is_an_issue_error() {
        let codec = codec();
        let res = codec.issue(&identity(GlobalRole::Employee), Duration::seconds(10_000_000_000_000), t0());
        assert!(matches!(res, Err(IssueError::LifetimeOutOfRange)));

        // Largest sane lifetime still round-trips with the reported expiry.
        let issued = codec.issue(&identity(GlobalRole::Employee), Duration::days(3650), t0()).unwrap();
        assert_eq!(issued.claims.expires_at, t0() + Duration::days(3650));
        assert_eq!(codec.verify(&issued.token, t0()).unwrap(), issued.claims);
    }

    #[test]
    fn verification_is_idempotent() {
        let codec = codec();
        let issued = codec.issue(&identity(GlobalRole::Employee), Duration::minutes(10), t0()).unwrap();
        let later = t0() + Duration::minutes(3);

        assert_eq!(codec.verify(&issued.token, later), codec.verify(&issued.token, later));

        let expired_at = t0() + Duration::minutes(11);
        assert_eq!(codec.verify(&issued.token, expired_at), Err(TokenError::Expired));
        assert_eq!(codec.verify(&issued.token, expired_at), Err(TokenError::Expired));
    }

    #[test]
    fn expiry_boundary() {
        let codec = codec();
        let issued = codec.issue(&identity(GlobalRole::Employee), Duration::seconds(60), t0()).unwrap();
        let exp = issued.claims.expires_at;

        assert!(codec.verify(&issued.token, exp - Duration::seconds(1)).is_ok());
        assert_eq!(codec.verify(&issued.token, exp), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_bad_signature() {
        let issued = codec().issue(&identity(GlobalRole::Admin), Duration::hours(1), t0()).unwrap();
        let other = Hs256TokenCodec::new(SigningSecret::new("another-secret").unwrap());

        assert_eq!(other.verify(&issued.token, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_is_bad_signature() {
        let codec = codec();
        for junk in ["", "abc", "a.b", "a.b.c", "not.a.jwt.at.all", "....."] {
            assert_eq!(codec.verify(junk, t0()), Err(TokenError::BadSignature), "{junk}");
        }
    }

    #[test]
    fn other_algorithms_are_rejected_before_claims() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &json!({ "userId": "u", "role": "ADMIN", "iat": 0, "exp": i64::MAX }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(codec().verify(&token, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn expired_takes_precedence_over_malformed_claims() {
        let token = mint_raw(json!({ "role": "WIZARD", "exp": t0().timestamp() - 1 }));
        assert_eq!(codec().verify(&token, t0()), Err(TokenError::Expired));
    }

    #[test]
    fn missing_or_unknown_claims_are_malformed() {
        let exp = t0().timestamp() + 3600;
        let iat = t0().timestamp();
        let cases = [
            json!({ "role": "ADMIN", "iat": iat, "exp": exp }),
            json!({ "userId": "u-1", "iat": iat, "exp": exp }),
            json!({ "userId": "u-1", "role": "admin", "iat": iat, "exp": exp }),
            json!({ "userId": "u-1", "role": "SUPERUSER", "iat": iat, "exp": exp }),
            json!({ "userId": "", "role": "ADMIN", "iat": iat, "exp": exp }),
            json!({ "userId": 7, "role": "ADMIN", "iat": iat, "exp": exp }),
            json!({ "userId": "u-1", "role": "ADMIN", "iat": iat }),
            json!({ "userId": "u-1", "role": "ADMIN", "exp": exp }),
        ];

        let codec = codec();
        for payload in cases {
            let token = mint_raw(payload.clone());
            assert_eq!(codec.verify(&token, t0()), Err(TokenError::MalformedClaims), "{payload}");
        }
    }

    #[test]
    fn flipping_first_signature_char_is_bad_signature() {
        let token = codec().issue(&identity(GlobalRole::Admin), Duration::hours(1), t0()).unwrap().token;
        let (_, sig) = token.rsplit_once('.').unwrap();
        let replacement = if sig.starts_with('A') { 'B' } else { 'A' };

        let tampered = tamper_signature(&token, 0, replacement);
        assert_eq!(codec().verify(&tampered, t0()), Err(TokenError::BadSignature));
    }

    #[test]
    fn tampered_payload_is_bad_signature() {
        let codec = codec();
        let token = codec.issue(&identity(GlobalRole::Employee), Duration::hours(1), t0()).unwrap().token;
        let parts: Vec<&str> = token.split('.').collect();

        // Same header and signature, payload re-signed by nobody.
        let forged_payload = mint_raw(json!({
            "userId": "user-42", "role": "ADMIN", "iat": t0().timestamp(), "exp": t0().timestamp() + 3600
        }));
        let forged_body = forged_payload.split('.').nth(1).unwrap();
        let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);

        assert_eq!(codec.verify(&forged, t0()), Err(TokenError::BadSignature));
    }

    const B64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: issue/verify round-trips for any identity and ttl when
        /// checked before expiry.
        #[test]
        fn round_trip_before_expiry(
            user in "[a-zA-Z0-9_-]{1,40}",
            email in "[a-z]{1,12}@[a-z]{1,12}\\.com",
            role_idx in 0usize..3,
            ttl_secs in 1i64..(60 * 60 * 24 * 365),
            elapsed_frac in 0.0f64..1.0,
        ) {
            let codec = codec();
            let identity = IdentityClaims {
                user_id: UserId::parse(user).unwrap(),
                email,
                role: GlobalRole::ALL[role_idx],
            };
            let issued = codec.issue(&identity, Duration::seconds(ttl_secs), t0()).unwrap();

            let elapsed = ((ttl_secs as f64) * elapsed_frac) as i64;
            let at = t0() + Duration::seconds(elapsed.min(ttl_secs - 1));
            let claims = codec.verify(&issued.token, at).unwrap();

            prop_assert_eq!(claims.identity(), identity);
            prop_assert_eq!(claims.expires_at - claims.issued_at, Duration::seconds(ttl_secs));
        }

        /// Property: replacing any single character of the signature segment
        /// yields `BadSignature`, never a claims error.
        #[test]
        fn signature_tamper_is_always_bad_signature(
            index_seed in any::<usize>(),
            replacement_idx in 0usize..B64URL.len(),
            non_alphabet in prop::bool::weighted(0.1),
        ) {
            let codec = codec();
            let token = codec.issue(&identity(GlobalRole::Employee), Duration::hours(1), t0()).unwrap().token;
            let (_, sig) = token.rsplit_once('.').unwrap();
            let index = index_seed % sig.len();
            let original = sig.as_bytes()[index];

            let mut replacement = if non_alphabet { b'!' } else { B64URL[replacement_idx] };
            if replacement == original {
                replacement = if original == b'A' { b'B' } else { b'A' };
            }

            let tampered = tamper_signature(&token, index, replacement as char);
            prop_assert_eq!(codec.verify(&tampered, t0()), Err(TokenError::BadSignature));
        }
    }
}
