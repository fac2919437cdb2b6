// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use rh_session::config::Config;
use rh_session::models::CredentialResponse;
use rh_session::storage::{KeyValueStorage, MemoryStorage};
use rh_session::{AuthSession, StorageError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockBuilder};

/// Config pointing both Supabase and the API at a mock server.
#[allow(dead_code)]
pub fn test_config(server_uri: &str) -> Config {
    // Ignore the error if another test already installed a subscriber.
    let _ = rh_session::logging::init_logging();

    Config {
        supabase_url: server_uri.to_string(),
        supabase_anon_key: "test_anon_key".to_string(),
        api_base_url: server_uri.to_string(),
        request_timeout: Duration::from_millis(500),
        ..Config::default()
    }
}

/// Matcher for the refresh endpoint.
#[allow(dead_code)]
pub fn refresh_endpoint() -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
}

#[allow(dead_code)]
pub fn credential(access: &str, refresh: Option<&str>) -> CredentialResponse {
    CredentialResponse {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        ..Default::default()
    }
}

/// Session over in-memory storage, seeded with the given tokens.
#[allow(dead_code)]
pub async fn seeded_session(
    server_uri: &str,
    access: &str,
    refresh: Option<&str>,
) -> (AuthSession, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let session = AuthSession::with_storage(&test_config(server_uri), storage.clone());
    assert!(session.save_auth_data(&credential(access, refresh)).await);
    (session, storage)
}

/// Session over `FlakyStorage`, seeded with the given tokens.
#[allow(dead_code)]
pub async fn flaky_session(
    server_uri: &str,
    access: &str,
    refresh: Option<&str>,
) -> (AuthSession, Arc<FlakyStorage>) {
    let storage = Arc::new(FlakyStorage::default());
    let session = AuthSession::with_storage(&test_config(server_uri), storage.clone());
    assert!(session.save_auth_data(&credential(access, refresh)).await);
    (session, storage)
}

/// Storage whose reads or writes can be switched to fail.
#[derive(Default)]
#[allow(dead_code)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Start failing reads once the next write has succeeded
    pub fail_reads_after_write: AtomicBool,
    /// Fail writes to keys containing this fragment only
    pub fail_key: std::sync::Mutex<Option<String>>,
}

#[allow(dead_code)]
impl FlakyStorage {
    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    fn write_fails(&self, key: &str) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_key
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|fragment| key.contains(fragment))
    }
}

#[async_trait]
impl KeyValueStorage for FlakyStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated read failure".to_string()));
        }
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.write_fails(key) {
            return Err(StorageError::Unavailable("simulated write failure".to_string()));
        }
        self.inner.set_item(key, value).await?;
        if self.fail_reads_after_write.load(Ordering::SeqCst) {
            self.fail_reads.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).await
    }
}
