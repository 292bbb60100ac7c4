//!
//! credstore: a credential and role store provider for web authentication layers.
//! This library validates credentials and resolves role memberships by querying a
//! pluggable key-value backend, leaving session handling and login flows to the host.
//!
//! ## Core Concepts
//!
//! * **Records (`record::Record`)**: A mapping of field name to JSON value. Users, roles and
//!   user/role links are all plain records; which fields mean what is decided by configuration.
//! * **Configuration (`config::ProviderConfig`)**: Collection and field names, the named
//!   connection to use, and whether role support is enabled. Validated once at construction.
//! * **Backends (`backend::BackendImpl`)**: The storage layer. It offers equality lookups,
//!   inserts and partial updates. Backends without a join operator get the role join emulated
//!   as two lookups and an in-memory intersection; SQL backends run a single quoted join.
//! * **Hashers (`crypto::CredentialHasher`)**: The hash/verify capability injected by the host.
//!   `crypto::Argon2Hasher` is the default.
//! * **Provider (`provider::Provider`)**: Ties the above together and exposes
//!   `authenticate_user`, `create_user`, `get_user_details`, `set_user_details`,
//!   `set_user_password` and `get_user_roles`.

pub mod backend;
pub mod config;
pub mod crypto;
pub mod provider;
pub mod record;

pub use backend::{Backend, BackendImpl, Connections};
pub use config::ProviderConfig;
pub use crypto::{Argon2Hasher, CredentialHasher};
pub use provider::{AuthProvider, Provider};
pub use record::Record;

/// Result type used throughout the credstore library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the credstore library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),

    /// Structured provider errors from the provider module
    #[error(transparent)]
    Provider(provider::ProviderError),

    /// Structured hashing errors from the crypto module
    #[error(transparent)]
    Crypto(crypto::CryptoError),

    /// Structured storage errors from the backend module
    #[error(transparent)]
    Backend(backend::BackendError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Provider(_) => "provider",
            Error::Crypto(_) => "crypto",
            Error::Backend(_) => "backend",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error was caused by invalid input from the caller.
    ///
    /// Usage errors are raised synchronously and retrying them cannot succeed.
    pub fn is_usage_error(&self) -> bool {
        match self {
            Error::Config(_) => true,
            Error::Provider(provider_err) => provider_err.is_usage_error(),
            _ => false,
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Provider(provider_err) => provider_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Provider(provider_err) => provider_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is database/backend-related.
    pub fn is_database_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error came out of password hashing.
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Error::Crypto(_))
    }
}
