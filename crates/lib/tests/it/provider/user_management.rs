use credstore::{ProviderConfig, Record};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_create_user_stores_extra_fields() {
    let provider = test_provider().await;
    let stored = provider
        .create_user(
            Record::new()
                .with("id", 10)
                .with("username", "alice")
                .with("email", "alice@example.com")
                .with("name", "Alice"),
        )
        .await
        .unwrap();
    assert_eq!(stored.get("id"), Some(&json!(10)));

    let fetched = provider.get_user_details("alice").await.unwrap().unwrap();
    assert_eq!(fetched.get("id"), Some(&json!(10)));
    assert_eq!(fetched.get_str("username"), Some("alice"));
    assert_eq!(fetched.get_str("email"), Some("alice@example.com"));
    assert_eq!(fetched.get_str("name"), Some("Alice"));
    assert_eq!(fetched.get_str("password"), Some(""));
}

#[tokio::test]
async fn test_create_user_discards_supplied_password() {
    let provider = test_provider().await;
    provider
        .create_user(
            Record::new()
                .with("username", "bob")
                .with("password", "sneaky"),
        )
        .await
        .unwrap();

    let fetched = provider.get_user_details("bob").await.unwrap().unwrap();
    assert_eq!(fetched.get_str("password"), Some(""));
    assert!(!provider.authenticate_user("bob", "sneaky").await.unwrap());
    assert!(!provider.authenticate_user("bob", "").await.unwrap());
}

#[tokio::test]
async fn test_create_user_generates_id() {
    let provider = test_provider().await;
    let first = provider
        .create_user(Record::new().with("username", "carol"))
        .await
        .unwrap();
    let second = provider
        .create_user(Record::new().with("username", "dave"))
        .await
        .unwrap();

    let first_id = first.get_str("id").unwrap();
    let second_id = second.get_str("id").unwrap();
    assert_ne!(first_id, second_id);
    assert!(uuid::Uuid::parse_str(first_id).is_ok());
}

#[tokio::test]
async fn test_create_user_errors() {
    let provider = test_provider().await;

    let err = provider
        .create_user(Record::new().with("email", "nobody@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_usage_error());

    provider
        .create_user(Record::new().with("username", "erin"))
        .await
        .unwrap();
    let err = provider
        .create_user(Record::new().with("username", "erin"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_set_user_details_round_trip() {
    let provider = test_provider().await;
    provider
        .create_user(
            Record::new()
                .with("id", 1)
                .with("username", "frank")
                .with("email", "old@example.com")
                .with("name", "Frank"),
        )
        .await
        .unwrap();

    let changes = Record::new().with("email", "new@example.com");
    let updated = provider
        .set_user_details("frank", changes.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get_str("email"), Some("new@example.com"));

    let fetched = provider.get_user_details("frank").await.unwrap().unwrap();
    for (field, value) in changes.iter() {
        assert_eq!(fetched.get(field), Some(value));
    }
    assert_eq!(fetched.get_str("name"), Some("Frank"));
    assert_eq!(fetched.get("id"), Some(&json!(1)));
}

#[tokio::test]
async fn test_set_user_details_can_rename() {
    let provider = test_provider().await;
    create_user_with_password(&provider, 1, "grace", Some("pw")).await;

    let updated = provider
        .set_user_details("grace", Record::new().with("username", "grace2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get_str("username"), Some("grace2"));

    assert!(provider.get_user_details("grace").await.unwrap().is_none());
    assert!(provider.authenticate_user("grace2", "pw").await.unwrap());
}

#[tokio::test]
async fn test_rename_onto_existing_username_is_conflict() {
    let provider = test_provider().await;
    create_user_with_password(&provider, 1, "alice", Some("alice-pw")).await;
    create_user_with_password(&provider, 2, "bob", Some("bob-pw")).await;

    let err = provider
        .set_user_details("bob", Record::new().with("username", "alice"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Both accounts are untouched
    let alice = provider.get_user_details("alice").await.unwrap().unwrap();
    assert_eq!(alice.get("id"), Some(&json!(1)));
    assert!(provider.authenticate_user("alice", "alice-pw").await.unwrap());
    assert!(provider.authenticate_user("bob", "bob-pw").await.unwrap());
}

#[tokio::test]
async fn test_set_user_details_unknown_user() {
    let provider = test_provider().await;
    let result = provider
        .set_user_details("ghost", Record::new().with("email", "x@example.com"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_empty_username_handling() {
    let provider = test_provider().await;

    assert!(provider.get_user_details("").await.unwrap().is_none());

    let err = provider
        .set_user_details("", Record::new().with("email", "x@example.com"))
        .await
        .unwrap_err();
    assert!(err.is_usage_error());

    let err = provider.set_user_password("", "pw").await.unwrap_err();
    assert!(err.is_usage_error());
}

#[tokio::test]
async fn test_custom_collection_and_field_names() {
    let config = ProviderConfig {
        users_path: "accounts".to_string(),
        users_id_key: "account_id".to_string(),
        users_username_key: "login".to_string(),
        users_password_key: "secret".to_string(),
        ..ProviderConfig::default()
    };
    let provider = test_provider_with(config).await;

    provider
        .create_user(Record::new().with("account_id", 3).with("login", "heidi"))
        .await
        .unwrap();
    provider.set_user_password("heidi", "pw").await.unwrap();

    let fetched = provider.get_user_details("heidi").await.unwrap().unwrap();
    assert!(fetched.get_str("secret").is_some_and(|s| !s.is_empty()));
    assert!(!fetched.contains("password"));
    assert!(provider.authenticate_user("heidi", "pw").await.unwrap());
}
