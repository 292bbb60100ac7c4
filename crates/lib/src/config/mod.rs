//! Provider configuration.
//!
//! Every collection and field name the provider touches is configurable. All settings
//! are optional; missing settings take the defaults below.
//!
//! | Setting                  | Default      |
//! |--------------------------|--------------|
//! | `connection`             | (default)    |
//! | `users_path`             | `users`      |
//! | `roles_path`             | `roles`      |
//! | `user_roles_path`        | `user_roles` |
//! | `users_id_key`           | `id`         |
//! | `users_username_key`     | `username`   |
//! | `users_password_key`     | `password`   |
//! | `roles_id_key`           | `id`         |
//! | `roles_role_key`         | `role`       |
//! | `user_roles_user_id_key` | `user_id`    |
//! | `user_roles_role_id_key` | `role_id`    |
//! | `disable_roles`          | `false`      |

mod errors;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use errors::ConfigError;

use crate::Result;
use crate::backend::RoleJoin;

/// Collection and field naming for a [`Provider`](crate::Provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Named backend connection; `None` selects the default connection.
    pub connection: Option<String>,
    /// Collection holding user records.
    pub users_path: String,
    /// Collection holding role records.
    pub roles_path: String,
    /// Collection holding user/role link records.
    pub user_roles_path: String,
    /// User id field.
    pub users_id_key: String,
    /// Username field, unique among users.
    pub users_username_key: String,
    /// Password hash field.
    pub users_password_key: String,
    /// Role id field.
    pub roles_id_key: String,
    /// Role name field.
    pub roles_role_key: String,
    /// Link field referencing a user id.
    pub user_roles_user_id_key: String,
    /// Link field referencing a role id.
    pub user_roles_role_id_key: String,
    /// Turns role lookups off entirely.
    pub disable_roles: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            connection: None,
            users_path: "users".to_string(),
            roles_path: "roles".to_string(),
            user_roles_path: "user_roles".to_string(),
            users_id_key: "id".to_string(),
            users_username_key: "username".to_string(),
            users_password_key: "password".to_string(),
            roles_id_key: "id".to_string(),
            roles_role_key: "role".to_string(),
            user_roles_user_id_key: "user_id".to_string(),
            user_roles_role_id_key: "role_id".to_string(),
            disable_roles: false,
        }
    }
}

impl ProviderConfig {
    /// Parses a configuration from JSON; absent settings take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| ConfigError::Malformed { source }.into())
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validates every name once, so that per-call code can trust them.
    pub fn validate(&self) -> Result<()> {
        for (setting, name) in self.named_settings() {
            check_name(setting, name)?;
        }
        if let Some(connection) = &self.connection {
            check_name("connection", connection)?;
        }

        check_distinct(&[
            ("users_id_key", &self.users_id_key),
            ("users_username_key", &self.users_username_key),
            ("users_password_key", &self.users_password_key),
        ])?;
        check_distinct(&[
            ("roles_id_key", &self.roles_id_key),
            ("roles_role_key", &self.roles_role_key),
        ])?;
        check_distinct(&[
            ("user_roles_user_id_key", &self.user_roles_user_id_key),
            ("user_roles_role_id_key", &self.user_roles_role_id_key),
        ])?;

        Ok(())
    }

    /// The collection and field names the role join runs over.
    pub fn role_join(&self) -> RoleJoin<'_> {
        RoleJoin {
            links: &self.user_roles_path,
            link_user_id: &self.user_roles_user_id_key,
            link_role_id: &self.user_roles_role_id_key,
            roles: &self.roles_path,
            role_id: &self.roles_id_key,
            role_name: &self.roles_role_key,
        }
    }

    fn named_settings(&self) -> [(&'static str, &str); 10] {
        [
            ("users_path", &self.users_path),
            ("roles_path", &self.roles_path),
            ("user_roles_path", &self.user_roles_path),
            ("users_id_key", &self.users_id_key),
            ("users_username_key", &self.users_username_key),
            ("users_password_key", &self.users_password_key),
            ("roles_id_key", &self.roles_id_key),
            ("roles_role_key", &self.roles_role_key),
            ("user_roles_user_id_key", &self.user_roles_user_id_key),
            ("user_roles_role_id_key", &self.user_roles_role_id_key),
        ]
    }
}

fn check_name(setting: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::EmptyName {
            setting: setting.to_string(),
        }
        .into());
    }
    if name.contains('\0') {
        return Err(ConfigError::InvalidName {
            setting: setting.to_string(),
            reason: "contains a NUL byte".to_string(),
        }
        .into());
    }
    Ok(())
}

fn check_distinct(settings: &[(&str, &String)]) -> Result<()> {
    for (i, (first, first_name)) in settings.iter().enumerate() {
        for (second, second_name) in &settings[i + 1..] {
            if first_name == second_name {
                return Err(ConfigError::DuplicateKey {
                    first: first.to_string(),
                    second: second.to_string(),
                    field: first_name.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}
