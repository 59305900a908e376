//! Password hashing and verification (bcrypt).

use thiserror::Error;

/// bcrypt work factor used unless configured otherwise.
pub const DEFAULT_COST: u32 = 10;

/// Plaintext hashed once at startup; verifying against it gives callers
/// without a stored hash the same cost as a real comparison.
const EQUALIZER_PLAINTEXT: &str = "tessera.equalizer";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No password is set for the identity.
    #[error("invalid credentials")]
    MissingHash,

    /// The password did not match (or the stored hash could not be parsed).
    #[error("invalid credentials")]
    Mismatch,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl CredentialError {
    /// True for the variants that collapse into "invalid credentials".
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, CredentialError::MissingHash | CredentialError::Mismatch)
    }
}

/// Verifies plaintext passwords against stored salted hashes.
///
/// Stateless apart from its configuration; cheap to clone and share.
#[derive(Clone)]
pub struct CredentialVerifier {
    cost: u32,
    equalizer_hash: String,
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Build a verifier hashing with the given bcrypt cost (4..=31).
    pub fn new(cost: u32) -> Result<Self, CredentialError> {
        let equalizer_hash = bcrypt::hash(EQUALIZER_PLAINTEXT, cost)
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;
        Ok(Self { cost, equalizer_hash })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// `true` iff `plaintext` matches `stored_hash`.
    pub fn verify(&self, plaintext: &str, stored_hash: Option<&str>) -> bool {
        self.check(plaintext, stored_hash).is_ok()
    }

    /// Like [`verify`](Self::verify) but keeps the internal reason.
    ///
    /// An absent or empty stored hash fails without running the comparison.
    pub fn check(&self, plaintext: &str, stored_hash: Option<&str>) -> Result<(), CredentialError> {
        let Some(stored_hash) = stored_hash.filter(|h| !h.is_empty()) else {
            return Err(CredentialError::MissingHash);
        };
        if plaintext.is_empty() {
            return Err(CredentialError::Mismatch);
        }

        match bcrypt::verify(plaintext, stored_hash) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CredentialError::Mismatch),
            Err(_) => {
                // The bcrypt error embeds the hash; keep it out of the logs.
                tracing::warn!("stored password hash is not a valid bcrypt hash");
                Err(CredentialError::Mismatch)
            }
        }
    }

    /// Spend one comparison's worth of work without a real hash.
    pub fn equalize(&self, plaintext: &str) {
        let _ = bcrypt::verify(plaintext, &self.equalizer_hash);
    }

    /// Produce a salted hash for storage.
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| CredentialError::Hashing(e.to_string()))
    }
}
