// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value storage layer for persisted auth state.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;
use async_trait::async_trait;

/// Async key-value storage, shaped after the mobile `AsyncStorage` API.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Get the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Remove several keys.
    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}

/// Names of the three keys that hold the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// JSON: access_token, expires_at, token_type
    pub auth_token: String,
    /// Plain string
    pub refresh_token: String,
    /// JSON user profile
    pub user_data: String,
}

impl StorageKeys {
    /// Keys for a Supabase project, e.g. `sb-abcdefgh-auth-token`.
    pub fn for_project(project_ref: &str) -> Self {
        let auth_token = format!("sb-{}-auth-token", project_ref);
        Self {
            refresh_token: format!("{}-refresh", auth_token),
            user_data: format!("{}-user", auth_token),
            auth_token,
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [
            self.auth_token.as_str(),
            self.refresh_token.as_str(),
            self.user_data.as_str(),
        ]
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::for_project("local")
    }
}
