//! In-memory backend implementation
//!
//! This module provides an in-memory implementation of the `BackendImpl` trait,
//! suitable for testing, development, or small deployments where the whole
//! credential set fits in memory and is saved to disk explicitly.

mod persistence;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::Result;
use crate::backend::BackendImpl;
use crate::record::{Record, value_key};

/// A simple in-memory backend keeping each collection as an ordered `Vec` of records.
///
/// Collections are created on first insert. Records are returned in insertion
/// order, which is the store order the role join reports in. Lookups are linear
/// scans with strict JSON equality, so `"Alice"` and `"alice"` are different
/// usernames and `7` and `"7"` are different ids.
///
/// It provides basic persistence via `save_to_file` and `load_from_file`,
/// serializing all collections to JSON.
#[derive(Debug, Default)]
pub struct InMemory {
    pub(crate) collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `collection`; zero for unknown collections.
    pub async fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Names of all collections holding at least one record, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Saves every collection to a file as JSON.
    ///
    /// # Arguments
    /// * `path` - The path to the file where the state should be saved.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads collections from a JSON file written by [`InMemory::save_to_file`].
    ///
    /// If the file does not exist, a new, empty `InMemory` backend is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }
}

#[async_trait]
impl BackendImpl for InMemory {
    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.field_eq(field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_in(
        &self,
        collection: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: HashSet<String> = values.iter().map(value_key).collect();
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| {
                        record
                            .get(field)
                            .is_some_and(|v| wanted.contains(&value_key(v)))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn insert_unique(
        &self,
        collection: &str,
        field: &str,
        record: Record,
    ) -> Result<Option<Record>> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        let taken = record
            .get(field)
            .is_some_and(|key| records.iter().any(|existing| existing.field_eq(field, key)));
        if taken {
            return Ok(None);
        }
        records.push(record.clone());
        Ok(Some(record))
    }

    async fn update_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        changes: &Record,
    ) -> Result<Option<Record>> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };

        match records.iter_mut().find(|record| record.field_eq(field, value)) {
            Some(record) => {
                record.merge(changes);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
