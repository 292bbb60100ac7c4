//! Credential and role lookups over a configured backend.
//!
//! [`Provider`] is the piece a host authentication layer talks to. It owns no
//! state beyond its configuration: every call is one or two backend round-trips,
//! and nothing read from the store is cached between calls.
//!
//! Unknown users are never errors. Lookups return `None` and authentication returns
//! `false`, and the two failure reasons of authentication (no such user, wrong or
//! missing password) are indistinguishable to the caller. They are distinguishable
//! in the debug log.

mod errors;

use std::sync::Arc;

use async_trait::async_trait;
use handle_trait::Handle;
use serde_json::Value;

pub use errors::ProviderError;

use crate::Result;
use crate::backend::{Backend, Connections};
use crate::config::ProviderConfig;
use crate::crypto::{Argon2Hasher, CredentialHasher};
use crate::record::Record;

/// Validates credentials and resolves roles for users stored in a [`Backend`].
///
/// Cheap to clone; clones share the backend and hasher.
///
/// ## Example
///
/// ```
/// # use credstore::{Backend, Provider, ProviderConfig, Record};
/// # use credstore::backend::database::InMemory;
/// # #[tokio::main]
/// # async fn main() -> credstore::Result<()> {
/// let backend = Backend::from_impl(InMemory::new());
/// let provider = Provider::with_default_hasher(ProviderConfig::default(), backend)?;
///
/// provider.create_user(Record::new().with("username", "alice")).await?;
/// assert!(!provider.authenticate_user("alice", "").await?);
///
/// provider.set_user_password("alice", "s3cret").await?;
/// assert!(provider.authenticate_user("alice", "s3cret").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Provider {
    config: Arc<ProviderConfig>,
    backend: Backend,
    hasher: Arc<dyn CredentialHasher>,
}

impl Provider {
    /// Creates a provider over `backend`.
    ///
    /// The configuration is validated here, once. Its `connection` setting is ignored
    /// since the backend is given directly.
    pub fn new(
        config: ProviderConfig,
        backend: Backend,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            backend,
            hasher,
        })
    }

    /// Creates a provider over the connection named by `config.connection`.
    ///
    /// Fails with [`ProviderError::UnknownConnection`] when that name (or the default,
    /// when unset) is not registered.
    pub fn from_connections(
        config: ProviderConfig,
        connections: &Connections,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Result<Self> {
        config.validate()?;
        let backend = connections.resolve(config.connection.as_deref())?;
        Self::new(config, backend, hasher)
    }

    /// Creates a provider over `backend` hashing with [`Argon2Hasher`].
    pub fn with_default_hasher(config: ProviderConfig, backend: Backend) -> Result<Self> {
        Self::new(config, backend, Arc::new(Argon2Hasher::new()))
    }

    /// The validated configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// A handle to the backend this provider queries.
    pub fn backend(&self) -> Backend {
        self.backend.handle()
    }

    /// Checks `password` against the stored hash of `username`.
    ///
    /// Returns `false` when the user does not exist, and when the stored password
    /// is missing or empty, whatever `password` is. Otherwise the hasher decides.
    pub async fn authenticate_user(&self, username: &str, password: &str) -> Result<bool> {
        let Some(user) = self.get_user_details(username).await? else {
            tracing::debug!(username, "Authentication denied: user not found");
            return Ok(false);
        };

        let stored_hash = match user.get_str(&self.config.users_password_key) {
            Some(hash) if !hash.is_empty() => hash,
            _ => {
                tracing::debug!(username, "Authentication denied: no password set");
                return Ok(false);
            }
        };

        let verified = self.hasher.verify(password, stored_hash)?;
        if verified {
            tracing::debug!(username, "Authentication succeeded");
        } else {
            tracing::debug!(username, "Authentication denied: password mismatch");
        }
        Ok(verified)
    }

    /// Stores a new user built from `fields` and returns the stored record.
    ///
    /// `fields` must carry a non-empty username. The password field is always stored
    /// empty, even if `fields` supplies one, so the account cannot authenticate until
    /// [`set_user_password`](Self::set_user_password) is called. A random UUID is
    /// used as the id when `fields` has none. Every other field is stored verbatim.
    pub async fn create_user(&self, fields: Record) -> Result<Record> {
        let username_key = &self.config.users_username_key;
        let username = match fields.get_str(username_key) {
            Some(username) if !username.is_empty() => username.to_string(),
            _ => {
                return Err(ProviderError::MissingUsername {
                    operation: "create_user".to_string(),
                }
                .into());
            }
        };

        let mut record = fields;
        record.set(self.config.users_password_key.as_str(), "");
        if !record.has_value(&self.config.users_id_key) {
            record.set(
                self.config.users_id_key.as_str(),
                uuid::Uuid::new_v4().to_string(),
            );
        }

        let Some(stored) = self
            .backend
            .insert_unique(&self.config.users_path, username_key, record)
            .await?
        else {
            return Err(ProviderError::UsernameTaken { username }.into());
        };
        tracing::debug!(username = %username, "Created user");
        Ok(stored)
    }

    /// Looks up the user record for `username`.
    ///
    /// An empty username returns `None` without querying the store. Matching uses
    /// the store's own equality, so case rules are the store's.
    pub async fn get_user_details(&self, username: &str) -> Result<Option<Record>> {
        if username.is_empty() {
            return Ok(None);
        }

        let user = self
            .backend
            .find_by(
                &self.config.users_path,
                &self.config.users_username_key,
                &Value::from(username),
            )
            .await?
            .into_iter()
            .next();

        if user.is_none() {
            tracing::debug!(username, "No user record found");
        }
        Ok(user)
    }

    /// Applies `changes` to the record of `username` and returns the updated record.
    ///
    /// Fields not named in `changes` are left as they are. Returns `None` when the
    /// user does not exist. Renaming onto a username another user holds fails with
    /// [`ProviderError::UsernameTaken`], and renaming to an empty username with
    /// [`ProviderError::MissingUsername`].
    pub async fn set_user_details(
        &self,
        username: &str,
        changes: Record,
    ) -> Result<Option<Record>> {
        if username.is_empty() {
            return Err(ProviderError::MissingUsername {
                operation: "set_user_details".to_string(),
            }
            .into());
        }

        let username_key = &self.config.users_username_key;
        if let Some(renamed) = changes.get(username_key) {
            let renamed = match renamed.as_str() {
                Some(name) if !name.is_empty() => name,
                _ => {
                    return Err(ProviderError::MissingUsername {
                        operation: "set_user_details".to_string(),
                    }
                    .into());
                }
            };
            if renamed != username && self.get_user_details(renamed).await?.is_some() {
                return Err(ProviderError::UsernameTaken {
                    username: renamed.to_string(),
                }
                .into());
            }
        }

        let updated = self
            .backend
            .update_where(
                &self.config.users_path,
                username_key,
                &Value::from(username),
                &changes,
            )
            .await?;

        match &updated {
            Some(_) => {
                let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
                tracing::debug!(username, ?fields, "Updated user details");
            }
            None => tracing::debug!(username, "No user record to update"),
        }
        Ok(updated)
    }

    /// Hashes `plaintext` and stores it as the password of `username`.
    ///
    /// Setting the password of a user that does not exist changes nothing.
    pub async fn set_user_password(&self, username: &str, plaintext: &str) -> Result<()> {
        if username.is_empty() {
            return Err(ProviderError::MissingUsername {
                operation: "set_user_password".to_string(),
            }
            .into());
        }

        let hash = self.hasher.hash(plaintext)?;
        let changes = Record::new().with(self.config.users_password_key.as_str(), hash);
        if self.set_user_details(username, changes).await?.is_some() {
            tracing::debug!(username, "Password changed");
        }
        Ok(())
    }

    /// Resolves the role names of `username`.
    ///
    /// Returns `None` when the user does not exist and an empty list when the user
    /// has no roles. Order is whatever the store returns. Fails with
    /// [`ProviderError::RolesDisabled`] when role support is turned off.
    pub async fn get_user_roles(&self, username: &str) -> Result<Option<Vec<String>>> {
        if self.config.disable_roles {
            return Err(ProviderError::RolesDisabled.into());
        }

        let Some(user) = self.get_user_details(username).await? else {
            return Ok(None);
        };

        // A user without an id cannot be referenced by any link.
        let roles = match user.get(&self.config.users_id_key) {
            Some(Value::Null) | None => Vec::new(),
            Some(user_id) => {
                self.backend
                    .role_names(&self.config.role_join(), user_id)
                    .await?
            }
        };

        tracing::debug!(username, count = roles.len(), "Resolved user roles");
        Ok(Some(roles))
    }

    /// Check if `username` holds `role`. Unknown users hold no roles.
    pub async fn user_has_role(&self, username: &str, role: &str) -> Result<bool> {
        Ok(self
            .get_user_roles(username)
            .await?
            .is_some_and(|roles| roles.iter().any(|r| r == role)))
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// The operations a host authentication layer calls.
///
/// Lets the host hold an `Arc<dyn AuthProvider>` without naming the concrete
/// provider. See [`Provider`] for the semantics of each operation.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// See [`Provider::authenticate_user`].
    async fn authenticate_user(&self, username: &str, password: &str) -> Result<bool>;

    /// See [`Provider::create_user`].
    async fn create_user(&self, fields: Record) -> Result<Record>;

    /// See [`Provider::get_user_details`].
    async fn get_user_details(&self, username: &str) -> Result<Option<Record>>;

    /// See [`Provider::set_user_details`].
    async fn set_user_details(&self, username: &str, changes: Record) -> Result<Option<Record>>;

    /// See [`Provider::set_user_password`].
    async fn set_user_password(&self, username: &str, plaintext: &str) -> Result<()>;

    /// See [`Provider::get_user_roles`].
    async fn get_user_roles(&self, username: &str) -> Result<Option<Vec<String>>>;
}

#[async_trait]
impl AuthProvider for Provider {
    async fn authenticate_user(&self, username: &str, password: &str) -> Result<bool> {
        Provider::authenticate_user(self, username, password).await
    }

    async fn create_user(&self, fields: Record) -> Result<Record> {
        Provider::create_user(self, fields).await
    }

    async fn get_user_details(&self, username: &str) -> Result<Option<Record>> {
        Provider::get_user_details(self, username).await
    }

    async fn set_user_details(&self, username: &str, changes: Record) -> Result<Option<Record>> {
        Provider::set_user_details(self, username, changes).await
    }

    async fn set_user_password(&self, username: &str, plaintext: &str) -> Result<()> {
        Provider::set_user_password(self, username, plaintext).await
    }

    async fn get_user_roles(&self, username: &str) -> Result<Option<Vec<String>>> {
        Provider::get_user_roles(self, username).await
    }
}
