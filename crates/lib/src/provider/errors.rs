//! Error types for provider operations.
//!
//! Only misuse is reported here. An unknown user is not an error: lookups return
//! `None` and authentication returns `false`.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors raised by [`Provider`](super::Provider) operations.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum ProviderError {
    /// An operation that needs a username was called without one.
    #[error("A username is required for {operation}")]
    MissingUsername {
        /// The operation that was called
        operation: String,
    },

    /// A user was created or renamed with a username that is already stored.
    #[error("Username already exists: {username}")]
    UsernameTaken { username: String },

    /// Role lookups were requested on a provider configured with `disable_roles`.
    #[error("Role support is disabled for this provider")]
    RolesDisabled,

    /// The configured connection name is not registered.
    #[error("Unknown backend connection: {name}")]
    UnknownConnection { name: String },
}

impl ProviderError {
    /// Check if this error was caused by how the provider was called or configured.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingUsername { .. }
                | ProviderError::RolesDisabled
                | ProviderError::UnknownConnection { .. }
        )
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::UnknownConnection { .. })
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        matches!(self, ProviderError::UsernameTaken { .. })
    }

    /// Get the username associated with this error, if any.
    pub fn username(&self) -> Option<&str> {
        match self {
            ProviderError::UsernameTaken { username } => Some(username),
            _ => None,
        }
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::Provider(err)
    }
}
