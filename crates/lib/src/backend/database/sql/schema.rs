//! SQL schema bootstrap for the provider's three tables.
//!
//! The provider never creates tables on its own. Hosts that manage their schema
//! elsewhere can ignore this module; hosts that want a working store from an empty
//! database call [`initialize`] once with the same [`ProviderConfig`] the provider
//! will use.
//!
//! The DDL is portable between SQLite and PostgreSQL. Only TEXT, BIGINT,
//! DOUBLE PRECISION and boolean columns are created, since those are the types
//! the `Any` driver can decode back into record values. The `Any` driver cannot
//! read a column SQLite declares as BOOLEAN, so on SQLite booleans live in
//! INTEGER columns and read back as 0 and 1.

use crate::Result;
use crate::config::ProviderConfig;

use super::{DbKind, SqlxBackend, SqlxResultExt, quote_ident};

/// Column type used for user and role ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdKind {
    /// Ids are strings, e.g. the UUIDs the provider generates.
    #[default]
    Text,
    /// Ids are 64-bit integers supplied by the caller.
    Integer,
}

impl IdKind {
    fn sql_type(self) -> &'static str {
        match self {
            IdKind::Text => "TEXT",
            IdKind::Integer => "BIGINT",
        }
    }
}

/// Column types accepted by [`add_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    BigInt,
    Double,
    Boolean,
}

impl ColumnType {
    /// The declared column type on `kind`.
    pub fn sql_type(self, kind: DbKind) -> &'static str {
        match (self, kind) {
            (ColumnType::Text, _) => "TEXT",
            (ColumnType::BigInt, _) => "BIGINT",
            (ColumnType::Double, _) => "DOUBLE PRECISION",
            (ColumnType::Boolean, DbKind::Sqlite) => "INTEGER",
            (ColumnType::Boolean, DbKind::Postgres) => "BOOLEAN",
        }
    }
}

/// Builds the `CREATE TABLE` statements for `config`.
///
/// Usernames are unique. A user/role link is keyed by both of its ids.
pub fn create_tables(config: &ProviderConfig, ids: IdKind) -> Result<Vec<String>> {
    config.validate()?;
    let id_type = ids.sql_type();

    Ok(vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {users} (
                {id} {id_type} PRIMARY KEY NOT NULL,
                {username} TEXT NOT NULL UNIQUE,
                {password} TEXT
            )",
            users = quote_ident(&config.users_path)?,
            id = quote_ident(&config.users_id_key)?,
            username = quote_ident(&config.users_username_key)?,
            password = quote_ident(&config.users_password_key)?,
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {roles} (
                {id} {id_type} PRIMARY KEY NOT NULL,
                {role} TEXT NOT NULL
            )",
            roles = quote_ident(&config.roles_path)?,
            id = quote_ident(&config.roles_id_key)?,
            role = quote_ident(&config.roles_role_key)?,
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {links} (
                {user_id} {id_type} NOT NULL,
                {role_id} {id_type} NOT NULL,
                PRIMARY KEY ({user_id}, {role_id})
            )",
            links = quote_ident(&config.user_roles_path)?,
            user_id = quote_ident(&config.user_roles_user_id_key)?,
            role_id = quote_ident(&config.user_roles_role_id_key)?,
        ),
    ])
}

/// Creates the users, roles and user_roles tables if they don't exist.
pub async fn initialize(
    backend: &SqlxBackend,
    config: &ProviderConfig,
    ids: IdKind,
) -> Result<()> {
    let pool = backend.pool();

    for statement in create_tables(config, ids)? {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .sql_context(&format!("Schema creation failed - SQL: {statement}"))?;
    }

    tracing::info!(
        users = %config.users_path,
        roles = %config.roles_path,
        user_roles = %config.user_roles_path,
        ids = ?ids,
        "Initialized credential schema"
    );
    Ok(())
}

/// Adds a nullable column to an existing table.
///
/// User records may carry arbitrary extra fields; on SQL backends each one needs a
/// column before it can be written.
pub async fn add_column(
    backend: &SqlxBackend,
    table: &str,
    column: &str,
    column_type: ColumnType,
) -> Result<()> {
    let statement = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table)?,
        quote_ident(column)?,
        column_type.sql_type(backend.kind())
    );
    sqlx::query(&statement)
        .execute(backend.pool())
        .await
        .sql_context(&format!("Failed to add column {column} to {table}"))?;

    tracing::debug!(table, column, "Added column");
    Ok(())
}
