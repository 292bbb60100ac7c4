//! JSON snapshots of an [`InMemory`] store.
//!
//! A snapshot is every collection, written whole. There is no journaling: whatever
//! changed after the last save is lost with the process.

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use super::InMemory;
use crate::{Error, Result, backend::errors::BackendError, record::Record};

/// Snapshot format version, stored as `_v` and omitted while it is 0.
const SNAPSHOT_VERSION: u8 = 0;

fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Rejects snapshots written by a newer format.
fn check_snapshot_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version == SNAPSHOT_VERSION {
        Ok(version)
    } else {
        Err(serde::de::Error::custom(format!(
            "snapshot version {version} is not readable (expected {SNAPSHOT_VERSION})"
        )))
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "check_snapshot_version"
    )]
    version: u8,
    #[serde(default)]
    collections: HashMap<String, Vec<Record>>,
}

/// Saves every collection to `path` as pretty-printed JSON.
pub(crate) async fn save_to_file<P: AsRef<Path>>(backend: &InMemory, path: P) -> Result<()> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        collections: backend.collections.read().await.clone(),
    };

    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| -> Error { BackendError::SerializationFailed { source: e }.into() })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })
}

/// Reads a snapshot back; a missing file is an empty store.
pub(crate) async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<InMemory> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => {
            let snapshot: Snapshot = serde_json::from_str(&json).map_err(|e| -> Error {
                BackendError::DeserializationFailed { source: e }.into()
            })?;
            Ok(InMemory {
                collections: RwLock::new(snapshot.collections),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(InMemory::new()),
        Err(e) => Err(BackendError::FileIo { source: e }.into()),
    }
}
