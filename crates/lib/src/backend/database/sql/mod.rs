//! SQL backends for credstore.
//!
//! One table per collection and one column per record field. SQLite is behind the
//! `sqlite` feature, PostgreSQL behind `postgres`; both run through sqlx's `AnyPool`.
//!
//! Statements are built by the `query` helpers: every collection and field
//! name is quoted with [`quote_ident`], every value is a bound parameter.
//! The role join runs as one `INNER JOIN` statement instead of the two-step
//! default.
//!
//! ## Schema
//!
//! Tables are owned by the host application. [`schema::initialize`] creates the
//! three tables the provider needs under their configured names, for setups that
//! want the provider to bootstrap its own storage.

mod query;
pub mod schema;

use std::any::Any;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::AnyPool;
#[cfg(feature = "postgres")]
use sqlx::Executor;
use sqlx::any::AnyPoolOptions;

pub use query::quote_ident;

use crate::Result;
use crate::backend::errors::BackendError;
use crate::backend::{BackendImpl, RoleJoin, value_text};
use crate::record::Record;

/// Attaches a context message to sqlx errors, turning them into
/// [`BackendError::SqlxError`].
pub(crate) trait SqlxResultExt<T> {
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            BackendError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Which database a [`SqlxBackend`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

/// Collections as SQL tables, over an sqlx `AnyPool`.
///
/// Each record field is a column of the same name. Columns the table lacks cannot
/// be written; add them with [`schema::add_column`] or the host's migrations.
///
/// Concurrent callers share the pool. With PostgreSQL,
/// [`connect_postgres_isolated`](Self::connect_postgres_isolated) gives each backend
/// its own schema.
#[derive(Debug)]
pub struct SqlxBackend {
    pool: AnyPool,
    kind: DbKind,
}

impl SqlxBackend {
    /// The connection pool, for running host-side statements.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn kind(&self) -> DbKind {
        self.kind
    }

    pub fn is_sqlite(&self) -> bool {
        self.kind == DbKind::Sqlite
    }

    pub fn is_postgres(&self) -> bool {
        self.kind == DbKind::Postgres
    }

    async fn fetch_records(
        &self,
        collection: &str,
        statement: query::AnyQuery<'_>,
        context: &str,
    ) -> Result<Vec<Record>> {
        let rows = statement.fetch_all(&self.pool).await.sql_context(context)?;
        rows.iter()
            .map(|row| query::decode_row(collection, row))
            .collect()
    }
}

/// Pool sizing for one backend.
struct PoolShape {
    max_connections: u32,
    /// Keep at least one connection open for the pool's whole life.
    pinned: bool,
    acquire_timeout: Option<std::time::Duration>,
}

impl PoolShape {
    fn options(&self) -> AnyPoolOptions {
        let mut options = AnyPoolOptions::new().max_connections(self.max_connections);
        if self.pinned {
            options = options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        if let Some(timeout) = self.acquire_timeout {
            options = options.acquire_timeout(timeout);
        }
        options
    }
}

#[cfg(feature = "sqlite")]
impl SqlxBackend {
    /// Opens (creating if needed) the SQLite database file at `path`.
    ///
    /// Only the file is created. The provider's tables come from
    /// [`schema::initialize`] or from the host's own migrations.
    ///
    /// ```ignore
    /// let backend = SqlxBackend::open_sqlite("auth.db").await?;
    /// schema::initialize(&backend, &config, IdKind::Text).await?;
    /// ```
    pub async fn open_sqlite<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Self::connect_sqlite(&format!("sqlite:{}?mode=rwc", path.as_ref().display())).await
    }

    /// Connects to SQLite with an sqlx connection URL such as `sqlite:./auth.db`.
    pub async fn connect_sqlite(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        // A shared-cache memory database disappears with its last connection.
        let in_memory = url.contains("mode=memory");
        let shape = PoolShape {
            max_connections: 5,
            pinned: in_memory,
            acquire_timeout: None,
        };
        let pool = shape
            .options()
            .connect(url)
            .await
            .sql_context("Failed to connect to SQLite")?;

        let pragmas = if in_memory {
            "PRAGMA busy_timeout = 5000;"
        } else {
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;"
        };
        sqlx::query(pragmas)
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;

        tracing::debug!(url, "Connected to SQLite");
        Ok(Self {
            pool,
            kind: DbKind::Sqlite,
        })
    }

    /// A private in-memory SQLite database, gone when the backend is dropped.
    pub async fn sqlite_in_memory() -> Result<Self> {
        let name = uuid::Uuid::new_v4().simple();
        Self::connect_sqlite(&format!("sqlite:file:credstore_{name}?mode=memory&cache=shared"))
            .await
    }
}

#[cfg(feature = "postgres")]
impl SqlxBackend {
    /// Connects to PostgreSQL using the server's default search path.
    pub async fn connect_postgres(url: &str) -> Result<Self> {
        Self::connect_postgres_in(url, None).await
    }

    /// Connects to PostgreSQL inside a freshly created schema of its own.
    ///
    /// Tables created through this backend are invisible to every other backend,
    /// which keeps parallel test runs apart.
    pub async fn connect_postgres_isolated(url: &str) -> Result<Self> {
        let schema = format!("credstore_{}", uuid::Uuid::new_v4().simple());
        Self::connect_postgres_in(url, Some(schema)).await
    }

    async fn connect_postgres_in(url: &str, schema: Option<String>) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let search_path = match &schema {
            Some(schema) => {
                let quoted = quote_ident(schema)?;
                let setup = AnyPoolOptions::new()
                    .max_connections(1)
                    .connect(url)
                    .await
                    .sql_context("Failed to connect to PostgreSQL")?;
                sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {quoted}"))
                    .execute(&setup)
                    .await
                    .sql_context(&format!("Failed to create schema {schema}"))?;
                setup.close().await;
                Some(format!("SET search_path TO {quoted}"))
            }
            None => None,
        };

        // Isolated pools are small and wait for a connection instead of failing.
        let shape = PoolShape {
            max_connections: if schema.is_some() { 2 } else { 5 },
            pinned: false,
            acquire_timeout: schema
                .as_ref()
                .map(|_| std::time::Duration::from_secs(30)),
        };
        let pool = shape
            .options()
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    if let Some(statement) = search_path {
                        conn.execute(statement.as_str()).await?;
                    }
                    Ok(())
                })
            })
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        tracing::debug!(schema = ?schema, "Connected to PostgreSQL");
        Ok(Self {
            pool,
            kind: DbKind::Postgres,
        })
    }
}

#[async_trait]
impl BackendImpl for SqlxBackend {
    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Record>> {
        let sql = query::select_by(collection, field)?;
        let statement = query::bind_value(sqlx::query(&sql), field, value)?;
        self.fetch_records(collection, statement, "Failed to look up records")
            .await
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

        let sql = query::select_in(collection, field, values.len())?;
        let mut statement = sqlx::query(&sql);
        for value in values {
            statement = query::bind_value(statement, field, value)?;
        }
        self.fetch_records(collection, statement, "Failed to look up records")
            .await
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record> {
        let fields: Vec<&str> = record.keys().map(String::as_str).collect();
        let sql = query::insert(collection, &fields)?;

        let mut statement = sqlx::query(&sql);
        for (field, value) in record.iter() {
            statement = query::bind_value(statement, field, value)?;
        }
        statement
            .execute(&self.pool)
            .await
            .sql_context("Failed to insert record")?;

        Ok(record)
    }

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

        // A concurrent insert that slipped past the lookup hits the UNIQUE index.
        match self.insert(collection, record).await {
            Ok(record) => Ok(Some(record)),
            Err(crate::Error::Backend(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_where(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        changes: &Record,
    ) -> Result<Option<Record>> {
        if !changes.is_empty() {
            let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
            let sql = query::update(collection, &fields, field)?;

            let mut statement = sqlx::query(&sql);
            for (changed, new_value) in changes.iter() {
                statement = query::bind_value(statement, changed, new_value)?;
            }
            statement = query::bind_value(statement, field, value)?;

            let result = statement
                .execute(&self.pool)
                .await
                .sql_context("Failed to update record")?;
            if result.rows_affected() == 0 {
                return Ok(None);
            }
        }

        // Re-read under the key as it is now, in case the update changed it.
        let key = changes.get(field).unwrap_or(value);
        Ok(self.find_by(collection, field, key).await?.into_iter().next())
    }

    async fn role_names(&self, join: &RoleJoin<'_>, user_id: &Value) -> Result<Vec<String>> {
        let sql = query::role_join(join)?;
        let statement = query::bind_value(sqlx::query(&sql), join.link_user_id, user_id)?;
        let rows = statement
            .fetch_all(&self.pool)
            .await
            .sql_context("Failed to resolve roles")?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = query::decode_column(row, 0).ok_or_else(|| {
                BackendError::UnsupportedColumn {
                    collection: join.roles.to_string(),
                    column: join.role_name.to_string(),
                }
            })?;
            names.extend(value_text(&name));
        }
        Ok(names)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
