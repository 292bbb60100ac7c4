//! Password hashing capability.
//!
//! The provider never hashes or compares passwords itself. It is handed a
//! [`CredentialHasher`] at construction and delegates both operations to it.
//! [`Argon2Hasher`] is the default, producing Argon2id PHC strings.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::rngs::OsRng;
use thiserror::Error as ThisError;

use crate::{Error, Result};

/// Errors raised by a [`CredentialHasher`].
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum CryptoError {
    /// Producing a hash from a plaintext failed.
    #[error("Password hashing failed: {reason}")]
    HashingFailed {
        /// Description of the failure
        reason: String,
    },
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

/// One-way password hashing and verification.
///
/// Implementations must be safe to share across tasks; the provider holds one
/// behind an `Arc` for its whole lifetime.
pub trait CredentialHasher: Send + Sync {
    /// Computes a storable hash of `plaintext`.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Checks `plaintext` against a stored `hash`.
    ///
    /// Returns `Ok(false)` for a mismatch, and also for a stored hash this
    /// hasher cannot interpret.
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool>;
}

/// Argon2id hasher with default parameters and a fresh random salt per hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Creates a hasher with the `argon2` crate's default parameters.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CryptoError::HashingFailed {
                reason: e.to_string(),
            })?;

        Ok(password_hash.to_string())
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
                return Ok(false);
            }
        };

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    algorithm = %parsed_hash.algorithm,
                    "Stored password hash cannot be verified with Argon2"
                );
                Ok(false)
            }
        }
    }
}
