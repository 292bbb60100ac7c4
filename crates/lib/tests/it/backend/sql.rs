//! SQLite-specific behaviour of the SQL backend.

use credstore::{
    Backend, Provider, ProviderConfig, Record,
    backend::{BackendError, BackendImpl},
    backend::database::{
        SqlxBackend,
        sql::schema::{self, ColumnType, IdKind},
    },
};
use serde_json::json;

async fn sqlite_with_schema(config: &ProviderConfig) -> SqlxBackend {
    let backend = SqlxBackend::sqlite_in_memory().await.unwrap();
    schema::initialize(&backend, config, IdKind::Integer)
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;
    schema::initialize(&backend, &config, IdKind::Integer)
        .await
        .unwrap();
    assert!(backend.is_sqlite());
}

#[tokio::test]
async fn test_missing_table_is_an_error() {
    let backend = SqlxBackend::sqlite_in_memory().await.unwrap();
    let err = backend
        .find_by("users", "username", &json!("alice"))
        .await
        .unwrap_err();
    assert!(err.is_database_error());
}

#[tokio::test]
async fn test_hostile_identifiers_are_quoted() {
    let config = ProviderConfig {
        users_path: "users\"; DROP TABLE roles; --".to_string(),
        roles_role_key: "role\" FROM roles; --".to_string(),
        ..ProviderConfig::default()
    };
    let backend = sqlite_with_schema(&config).await;
    let provider = Provider::with_default_hasher(config, Backend::from_impl(backend)).unwrap();

    crate::helpers::create_user_with_password(&provider, 7, "alice", Some("pw")).await;
    crate::helpers::seed_roles(&provider, &[(1, "admin")], &[(7, 1)]).await;

    assert!(provider.authenticate_user("alice", "pw").await.unwrap());
    assert_eq!(
        provider.get_user_roles("alice").await.unwrap(),
        Some(vec!["admin".to_string()])
    );
}

#[tokio::test]
async fn test_scalar_values_round_trip() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;
    schema::add_column(&backend, "users", "score", ColumnType::Double)
        .await
        .unwrap();
    schema::add_column(&backend, "users", "active", ColumnType::Boolean)
        .await
        .unwrap();
    schema::add_column(&backend, "users", "nickname", ColumnType::Text)
        .await
        .unwrap();

    backend
        .insert(
            "users",
            Record::new()
                .with("id", 1)
                .with("username", "alice")
                .with("score", 2.5)
                .with("active", true)
                .with("nickname", serde_json::Value::Null),
        )
        .await
        .unwrap();

    let user = backend
        .find_by("users", "username", &json!("alice"))
        .await
        .unwrap()
        .remove(0);
    assert_eq!(user.get("id"), Some(&json!(1)));
    assert_eq!(user.get("score"), Some(&json!(2.5)));
    // SQLite has no boolean storage class
    assert_eq!(user.get("active"), Some(&json!(1)));
    assert_eq!(user.get("nickname"), Some(&serde_json::Value::Null));
    assert_eq!(user.get("password"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn test_boolean_column_keeps_users_readable() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;
    schema::add_column(&backend, "users", "active", ColumnType::Boolean)
        .await
        .unwrap();
    let provider = Provider::with_default_hasher(config, Backend::from_impl(backend)).unwrap();

    provider
        .create_user(
            Record::new()
                .with("id", 1)
                .with("username", "alice")
                .with("active", true),
        )
        .await
        .unwrap();
    provider.set_user_password("alice", "pw").await.unwrap();

    assert!(provider.authenticate_user("alice", "pw").await.unwrap());
    let user = provider.get_user_details("alice").await.unwrap().unwrap();
    assert_eq!(user.get("active"), Some(&json!(1)));

    let updated = provider
        .set_user_details("alice", Record::new().with("active", false))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get("active"), Some(&json!(0)));
}

#[tokio::test]
async fn test_undecodable_role_name_is_an_error() {
    let config = ProviderConfig::default();
    let backend = SqlxBackend::sqlite_in_memory().await.unwrap();
    for statement in [
        "CREATE TABLE roles (id BIGINT PRIMARY KEY, role BLOB)",
        "CREATE TABLE user_roles (user_id BIGINT, role_id BIGINT)",
        "INSERT INTO roles (id, role) VALUES (1, X'00FF')",
        "INSERT INTO user_roles (user_id, role_id) VALUES (7, 1)",
    ] {
        sqlx::query(statement).execute(backend.pool()).await.unwrap();
    }

    let err = backend
        .role_names(&config.role_join(), &json!(7))
        .await
        .unwrap_err();
    assert!(err.is_database_error());
    assert!(matches!(
        err,
        credstore::Error::Backend(BackendError::UnsupportedColumn { .. })
    ));
}

#[tokio::test]
async fn test_unique_index_violation_is_detected() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;

    backend
        .insert("users", Record::new().with("id", 1).with("username", "alice"))
        .await
        .unwrap();
    // What an insert racing past the lookup runs into
    let err = backend
        .insert("users", Record::new().with("id", 2).with("username", "alice"))
        .await
        .unwrap_err();
    match err {
        credstore::Error::Backend(err) => assert!(err.is_unique_violation()),
        other => panic!("expected a backend error, got {other:?}"),
    }

    let stored = backend
        .insert_unique(
            "users",
            "username",
            Record::new().with("id", 3).with("username", "alice"),
        )
        .await
        .unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_nested_values_are_rejected() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;

    let err = backend
        .insert(
            "users",
            Record::new()
                .with("id", 1)
                .with("username", json!(["alice"])),
        )
        .await
        .unwrap_err();
    assert!(err.is_database_error());
}

#[tokio::test]
async fn test_unique_username_enforced_by_schema() {
    let config = ProviderConfig::default();
    let backend = sqlite_with_schema(&config).await;

    backend
        .insert("users", Record::new().with("id", 1).with("username", "alice"))
        .await
        .unwrap();
    let err = backend
        .insert("users", Record::new().with("id", 2).with("username", "alice"))
        .await
        .unwrap_err();
    assert!(err.is_database_error());
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("auth.db");
    let config = ProviderConfig::default();

    {
        let backend = SqlxBackend::open_sqlite(&path).await.unwrap();
        schema::initialize(&backend, &config, IdKind::Text)
            .await
            .unwrap();
        let provider =
            Provider::with_default_hasher(config.clone(), Backend::from_impl(backend)).unwrap();
        provider
            .create_user(Record::new().with("username", "alice"))
            .await
            .unwrap();
        provider.set_user_password("alice", "s3cret").await.unwrap();
    }

    let backend = SqlxBackend::open_sqlite(&path).await.unwrap();
    let provider = Provider::with_default_hasher(config, Backend::from_impl(backend)).unwrap();
    assert!(provider.authenticate_user("alice", "s3cret").await.unwrap());
}
