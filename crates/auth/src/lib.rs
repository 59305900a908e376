//! `tessera-auth`: authentication and authorization core.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence is
//! reached only through the traits in [`directory`].

pub mod authenticate;
pub mod authorize;
pub mod claims;
pub mod directory;
pub mod password;
pub mod roles;
pub mod token;

#[cfg(test)]
mod testing;

pub use authenticate::{
    AuthError, AuthenticationService, DEFAULT_TOKEN_TTL_SECS, Registration, RegistrationError,
};
pub use authorize::{AccessPolicy, AuthorizationEngine, AuthzError, DEFAULT_LOOKUP_TIMEOUT, Grant};
pub use claims::{Claims, IdentityClaims};
pub use directory::{
    MembershipDirectory, NewUser, ProjectMembership, StoreError, UserDirectory, UserRecord, UserStatus,
    normalize_email,
};
pub use password::{CredentialError, CredentialVerifier};
pub use roles::{GlobalRole, ProjectRole, UnknownRole};
pub use token::{Hs256TokenCodec, IssueError, IssuedToken, SecretError, SigningSecret, TokenCodec, TokenError};
