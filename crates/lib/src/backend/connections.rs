//! Named backend connections.
//!
//! A host application may talk to several stores. Providers pick theirs by the
//! `connection` setting; an unset setting selects the default connection.

use std::collections::HashMap;

use handle_trait::Handle;

use super::Backend;
use crate::Result;
use crate::provider::ProviderError;

/// Name reported when the default connection is requested but none is set.
const DEFAULT_CONNECTION: &str = "default";

/// Registry of named [`Backend`] handles plus an optional default.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    default: Option<Backend>,
    named: HashMap<String, Backend>,
}

impl Connections {
    /// Creates a registry whose default connection is `backend`.
    pub fn new(backend: Backend) -> Self {
        Self {
            default: Some(backend),
            named: HashMap::new(),
        }
    }

    /// Builder-style registration of a named connection.
    pub fn with(mut self, name: impl Into<String>, backend: Backend) -> Self {
        self.insert(name, backend);
        self
    }

    /// Registers `backend` under `name`, returning any backend it replaced.
    pub fn insert(&mut self, name: impl Into<String>, backend: Backend) -> Option<Backend> {
        self.named.insert(name.into(), backend)
    }

    /// Replaces the default connection.
    pub fn set_default(&mut self, backend: Backend) {
        self.default = Some(backend);
    }

    /// Looks up a connection; `None` selects the default.
    pub fn resolve(&self, name: Option<&str>) -> Result<Backend> {
        let backend = match name {
            Some(name) => self.named.get(name),
            None => self.default.as_ref(),
        };

        match backend {
            Some(backend) => Ok(backend.handle()),
            None => Err(ProviderError::UnknownConnection {
                name: name.unwrap_or(DEFAULT_CONNECTION).to_string(),
            }
            .into()),
        }
    }

    /// Names of all registered named connections.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}
