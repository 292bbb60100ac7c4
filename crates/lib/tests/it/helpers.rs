use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use credstore::{
    Argon2Hasher, Backend, CredentialHasher, Provider, ProviderConfig, Record, Result,
    backend::database::InMemory,
};

// ==========================
// CORE TEST FACTORIES
// ==========================
// These are the foundation for all test setup. They provide a single point of change
// for backend matrix testing via TEST_BACKEND env var.

/// Creates a test backend based on TEST_BACKEND env var.
///
/// Supported values:
/// - "inmemory" or unset: InMemory backend (default)
/// - "sqlite": SQLite in-memory backend (requires `sqlite` feature)
///
/// SQL backends get the provider tables for `config` created with integer ids,
/// plus the `email` and `name` columns the tests write.
///
/// # Panics
/// Panics if TEST_BACKEND=sqlite but the `sqlite` feature is not enabled.
///
/// # Example
/// ```bash
/// # Run tests with InMemory (default)
/// cargo test
///
/// # Run tests with SQLite
/// TEST_BACKEND=sqlite cargo test --features sqlite
/// ```
pub async fn test_backend_for(config: &ProviderConfig) -> Backend {
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("sqlite") => {
            #[cfg(feature = "sqlite")]
            {
                use credstore::backend::database::SqlxBackend;
                use credstore::backend::database::sql::schema::{self, ColumnType, IdKind};

                let backend = SqlxBackend::sqlite_in_memory()
                    .await
                    .expect("Failed to create SQLite backend");
                schema::initialize(&backend, config, IdKind::Integer)
                    .await
                    .expect("Failed to initialize schema");
                for column in ["email", "name"] {
                    schema::add_column(&backend, &config.users_path, column, ColumnType::Text)
                        .await
                        .expect("Failed to add column");
                }
                Backend::from_impl(backend)
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = config;
                panic!("TEST_BACKEND=sqlite requires the 'sqlite' feature to be enabled")
            }
        }
        Ok("inmemory") | Ok("") | Err(_) => Backend::from_impl(InMemory::new()),
        Ok(other) => {
            panic!("Unknown TEST_BACKEND value: {other}. Supported: inmemory, sqlite")
        }
    }
}

/// Creates a test backend for the default configuration.
pub async fn test_backend() -> Backend {
    test_backend_for(&ProviderConfig::default()).await
}

/// Creates a provider with default configuration over a fresh test backend.
pub async fn test_provider() -> Provider {
    test_provider_with(ProviderConfig::default()).await
}

/// Creates a provider with `config` over a fresh test backend.
pub async fn test_provider_with(config: ProviderConfig) -> Provider {
    let backend = test_backend_for(&config).await;
    Provider::with_default_hasher(config, backend).expect("Failed to create provider")
}

/// Creates a provider whose hasher counts calls.
pub async fn test_provider_counting() -> (Provider, Arc<CountingHasher>) {
    let config = ProviderConfig::default();
    let backend = test_backend_for(&config).await;
    let hasher = Arc::new(CountingHasher::default());
    let provider =
        Provider::new(config, backend, hasher.clone()).expect("Failed to create provider");
    (provider, hasher)
}

// ==========================
// DATA SETUP
// ==========================

/// Creates a user with `username` and `id`, then sets `password` if given.
pub async fn create_user_with_password(
    provider: &Provider,
    id: i64,
    username: &str,
    password: Option<&str>,
) {
    let config = provider.config();
    provider
        .create_user(
            Record::new()
                .with(config.users_id_key.as_str(), id)
                .with(config.users_username_key.as_str(), username),
        )
        .await
        .expect("Failed to create user");
    if let Some(password) = password {
        provider
            .set_user_password(username, password)
            .await
            .expect("Failed to set password");
    }
}

/// Inserts role records and user/role links using the provider's field names.
pub async fn seed_roles(provider: &Provider, roles: &[(i64, &str)], links: &[(i64, i64)]) {
    let config = provider.config();
    let backend = provider.backend();
    for (id, role) in roles {
        backend
            .insert(
                &config.roles_path,
                Record::new()
                    .with(config.roles_id_key.as_str(), *id)
                    .with(config.roles_role_key.as_str(), *role),
            )
            .await
            .expect("Failed to insert role");
    }
    for (user_id, role_id) in links {
        backend
            .insert(
                &config.user_roles_path,
                Record::new()
                    .with(config.user_roles_user_id_key.as_str(), *user_id)
                    .with(config.user_roles_role_id_key.as_str(), *role_id),
            )
            .await
            .expect("Failed to insert link");
    }
}

/// Role order is store-dependent; compare sorted.
pub fn sorted(mut roles: Vec<String>) -> Vec<String> {
    roles.sort();
    roles
}

// ==========================
// HASHERS
// ==========================

/// Argon2 hasher that records how often it is called.
#[derive(Debug, Default)]
pub struct CountingHasher {
    inner: Argon2Hasher,
    hashes: AtomicUsize,
    verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn hash_calls(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(plaintext)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(plaintext, hash)
    }
}
