//! Records stored in backend collections.
//!
//! A [`Record`] is a flat mapping of field name to JSON value. The provider never
//! assumes a fixed schema: which field holds the id, the username or the password
//! hash is decided by [`ProviderConfig`](crate::config::ProviderConfig).

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record in a collection, keyed by field name.
///
/// Fields are kept sorted by name, so two records with the same fields compare equal
/// and serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the value of `field` when it is a JSON string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets `field` to `value`, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Builder-style variant of [`Record::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Removes `field`, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns true if `field` is present, even with a null value.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns true if `field` holds a value that is neither null nor an empty string.
    pub fn has_value(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Strict equality of `field` against `value`.
    ///
    /// A missing field never matches, not even a null `value`.
    pub fn field_eq(&self, field: &str, value: &Value) -> bool {
        self.0.get(field) == Some(value)
    }

    /// Applies a partial update: fields in `changes` overwrite, all others stay.
    pub fn merge(&mut self, changes: &Record) {
        for (field, value) in changes.iter() {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Consumes the record, returning the underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Record {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Stable string key for a JSON value, used to intersect ids in memory.
///
/// Distinct JSON values map to distinct keys, so `1` and `"1"` stay apart.
pub(crate) fn value_key(value: &Value) -> String {
    value.to_string()
}
