//! Backend implementations for credstore storage
//!
//! This module provides the core `BackendImpl` trait, the cheap `Backend` handle
//! wrapping it, the `Connections` registry of named backends, and the concrete
//! implementations under [`database`].
//!
//! A backend only has to offer equality lookups, inserts and partial updates over
//! named collections of [`Record`]s. The role join the provider needs is a default
//! trait method built from those lookups, so stores without any join operator work
//! unchanged. Backends that do have one (SQL) override it with a single query.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use handle_trait::Handle;
use serde_json::Value;

use crate::Result;
use crate::record::{Record, value_key};

mod connections;
pub mod database;
pub mod errors;

pub use connections::Connections;
pub use errors::BackendError;

/// Collection and field names of the user → role join.
///
/// Borrowed from a [`ProviderConfig`](crate::ProviderConfig) via
/// [`role_join`](crate::ProviderConfig::role_join).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleJoin<'a> {
    /// Link collection (user_roles).
    pub links: &'a str,
    /// Link field holding the user id.
    pub link_user_id: &'a str,
    /// Link field holding the role id.
    pub link_role_id: &'a str,
    /// Role collection.
    pub roles: &'a str,
    /// Role id field.
    pub role_id: &'a str,
    /// Role name field.
    pub role_name: &'a str,
}

/// Storage trait abstracting the backing key-value store.
///
/// All operations are single request/response round-trips. Implementations must be
/// `Send` and `Sync` so one backend can serve concurrent callers; whether concurrent
/// use is actually safe is up to the implementation's own client.
///
/// Errors are returned as-is. Callers never retry.
#[async_trait]
pub trait BackendImpl: Send + Sync + Any {
    /// Returns every record in `collection` whose `field` equals `value`.
    ///
    /// Equality is the store's own: no case folding or type coercion is added here.
    /// A collection that does not exist yields an empty result.
    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Record>>;

    /// Returns every record in `collection` whose `field` equals any of `values`.
    ///
    /// An empty `values` slice yields an empty result without touching the store.
    async fn find_in(&self, collection: &str, field: &str, values: &[Value])
    -> Result<Vec<Record>>;

    /// Inserts `record` into `collection` and returns it as stored.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record>;

    /// Inserts `record` unless `collection` already holds a record with the same
    /// `field` value. Returns `None` when the value is taken.
    ///
    /// The default implementation looks up then inserts, so two concurrent callers
    /// can both succeed. Stores that can check and insert in one step override it.
    async fn insert_unique(
        &self,
        collection: &str,
        field: &str,
        record: Record,
    ) -> Result<Option<Record>> {
        if let Some(key) = record.get(field) {
            if !self.find_by(collection, field, key).await?.is_empty() {
                return Ok(None);
            }
        }
        self.insert(collection, record).await.map(Some)
    }

    /// Applies `changes` to the first record whose `field` equals `value`.
    ///
    /// Fields absent from `changes` are left untouched. Returns the updated record,
    /// or `None` when no record matched.
    async fn update_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        changes: &Record,
    ) -> Result<Option<Record>>;

    /// Resolves the role names linked to `user_id`.
    ///
    /// The default implementation is a two-step inner join for stores without one:
    /// fetch the links for the user, fetch the roles for the linked ids, then project
    /// role names in link order. Links pointing at a missing role contribute nothing.
    async fn role_names(&self, join: &RoleJoin<'_>, user_id: &Value) -> Result<Vec<String>> {
        let links = self.find_by(join.links, join.link_user_id, user_id).await?;

        let mut seen = HashSet::new();
        let role_ids: Vec<Value> = links
            .iter()
            .filter_map(|link| link.get(join.link_role_id))
            .filter(|role_id| seen.insert(value_key(role_id)))
            .cloned()
            .collect();

        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let roles = self.find_in(join.roles, join.role_id, &role_ids).await?;

        let mut names_by_id: HashMap<String, Vec<String>> = HashMap::new();
        for role in &roles {
            let (Some(id), Some(name)) = (role.get(join.role_id), role.get(join.role_name)) else {
                continue;
            };
            if let Some(name) = value_text(name) {
                names_by_id.entry(value_key(id)).or_default().push(name);
            }
        }

        Ok(links
            .iter()
            .filter_map(|link| link.get(join.link_role_id))
            .filter_map(|role_id| names_by_id.get(&value_key(role_id)))
            .flatten()
            .cloned()
            .collect())
    }

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Renders a role name field as text; null names are skipped.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Cheap, cloneable handle to a backend.
///
/// Every clone shares the same underlying `BackendImpl`.
#[derive(Clone, Handle)]
pub struct Backend {
    backend_impl: Arc<dyn BackendImpl>,
}

impl Backend {
    /// Create a new Backend wrapping a shared BackendImpl
    pub fn new(backend_impl: Arc<dyn BackendImpl>) -> Self {
        Self { backend_impl }
    }

    /// Create a new Backend taking ownership of a BackendImpl
    pub fn from_impl<B: BackendImpl>(backend_impl: B) -> Self {
        Self::new(Arc::new(backend_impl))
    }

    /// Equality lookup, see [`BackendImpl::find_by`].
    pub async fn find_by(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Record>> {
        self.backend_impl.find_by(collection, field, value).await
    }

    /// Set lookup, see [`BackendImpl::find_in`].
    pub async fn find_in(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>> {
        self.backend_impl.find_in(collection, field, values).await
    }

    /// Insert, see [`BackendImpl::insert`].
    pub async fn insert(&self, collection: &str, record: Record) -> Result<Record> {
        self.backend_impl.insert(collection, record).await
    }

    /// Insert guarded by a unique field, see [`BackendImpl::insert_unique`].
    pub async fn insert_unique(
        &self,
        collection: &str,
        field: &str,
        record: Record,
    ) -> Result<Option<Record>> {
        self.backend_impl
            .insert_unique(collection, field, record)
            .await
    }

    /// Partial update, see [`BackendImpl::update_where`].
    pub async fn update_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        changes: &Record,
    ) -> Result<Option<Record>> {
        self.backend_impl
            .update_where(collection, field, value, changes)
            .await
    }

    /// Role join, see [`BackendImpl::role_names`].
    pub async fn role_names(&self, join: &RoleJoin<'_>, user_id: &Value) -> Result<Vec<String>> {
        self.backend_impl.role_names(join, user_id).await
    }

    /// Downcast to a concrete backend type.
    pub fn downcast_ref<T: BackendImpl>(&self) -> Option<&T> {
        self.backend_impl.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}
