//! Configuration error types for the credstore library.
//!
//! Configuration errors are usage errors: they are raised once, when a provider is
//! constructed, and are never retried.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors found while validating a [`ProviderConfig`](super::ProviderConfig).
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// A collection or field name was configured as an empty string.
    #[error("Configuration setting '{setting}' must not be empty")]
    EmptyName {
        /// The configuration key holding the empty name
        setting: String,
    },

    /// A collection or field name contains characters no backend can address.
    #[error("Configuration setting '{setting}' has an invalid name: {reason}")]
    InvalidName {
        /// The configuration key holding the invalid name
        setting: String,
        /// Why the name was rejected
        reason: String,
    },

    /// Two settings that must name different fields name the same one.
    #[error("Configuration settings '{first}' and '{second}' both name field '{field}'")]
    DuplicateKey {
        /// The first configuration key
        first: String,
        /// The second configuration key
        second: String,
        /// The shared field name
        field: String,
    },

    /// The configuration text is not valid JSON or has mistyped settings.
    #[error("Malformed configuration: {source}")]
    Malformed {
        /// The underlying parse error
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// The configuration key this error is about, if it names one.
    pub fn setting(&self) -> Option<&str> {
        match self {
            ConfigError::EmptyName { setting } | ConfigError::InvalidName { setting, .. } => {
                Some(setting)
            }
            ConfigError::DuplicateKey { second, .. } => Some(second),
            ConfigError::Malformed { .. } => None,
        }
    }

    /// Check if the configuration text could not be parsed at all.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ConfigError::Malformed { .. })
    }

    /// Check if this error is about two settings colliding.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ConfigError::DuplicateKey { .. })
    }
}

// Conversion from ConfigError to the main Error type
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}
