// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence of the credential and the cached user profile.
//!
//! `TokenStore` is the only component that touches the persisted auth keys.
//! Writes are serialized with an async read/write lock so that a reader
//! never observes a half-applied `save`.
//!
//! Reads fail closed: if storage errors or holds data that does not parse,
//! the value is reported as absent and the caller is forced to
//! re-authenticate instead of using a token of unknown state.

use crate::error::StorageError;
use crate::models::credential::StoredTokenData;
use crate::models::{normalize_token_type, Credential, CredentialResponse, UserProfile};
use crate::storage::{KeyValueStorage, StorageKeys};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
enum ProfileUpdate {
    /// New identity: the response's profile, or none.
    Replace,
    /// Same identity: keep the cached profile unless a new one is sent.
    KeepCached,
}

/// Durable store for the session credential.
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    keys: StorageKeys,
    lock: RwLock<()>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, keys: StorageKeys) -> Self {
        Self {
            storage,
            keys,
            lock: RwLock::new(()),
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Persist a sign-in or registration response.
    ///
    /// The credential and the profile are replaced together: a response
    /// without a user removes the cached profile, and a response without a
    /// refresh token removes the stored one.
    ///
    /// If any write fails, all auth keys are removed before returning the
    /// error so that no partially written credential survives.
    pub async fn save(&self, response: &CredentialResponse) -> Result<Credential, StorageError> {
        self.persist(response, ProfileUpdate::Replace).await
    }

    /// Persist a refresh response. A response without a user keeps the
    /// cached profile; otherwise behaves like [`TokenStore::save`].
    pub async fn save_refreshed(
        &self,
        response: &CredentialResponse,
    ) -> Result<Credential, StorageError> {
        self.persist(response, ProfileUpdate::KeepCached).await
    }

    async fn persist(
        &self,
        response: &CredentialResponse,
        profile: ProfileUpdate,
    ) -> Result<Credential, StorageError> {
        let credential = response.to_credential().ok_or_else(|| {
            StorageError::InvalidData("response has an empty access_token".to_string())
        })?;

        // Encode up front: nothing is written if encoding fails.
        let token_blob = serde_json::to_string(&StoredTokenData::from(&credential))?;
        let user_blob = response
            .user
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let _guard = self.lock.write().await;

        if let Err(e) = self
            .write_all(&credential, &token_blob, user_blob.as_deref(), profile)
            .await
        {
            tracing::error!(error = %e, "Failed to persist credential, clearing session");
            if let Err(clear_err) = self.storage.multi_remove(&self.keys.all()).await {
                tracing::error!(error = %clear_err, "Failed to clear partially written session");
            }
            return Err(e);
        }

        tracing::debug!(
            has_refresh_token = credential.refresh_token.is_some(),
            has_profile = user_blob.is_some(),
            expires_at = ?credential.expires_at,
            "Credential saved"
        );
        Ok(credential)
    }

    async fn write_all(
        &self,
        credential: &Credential,
        token_blob: &str,
        user_blob: Option<&str>,
        profile: ProfileUpdate,
    ) -> Result<(), StorageError> {
        match &credential.refresh_token {
            Some(token) => self.storage.set_item(&self.keys.refresh_token, token).await?,
            None => self.storage.remove_item(&self.keys.refresh_token).await?,
        }

        self.storage
            .set_item(&self.keys.auth_token, token_blob)
            .await?;

        match (user_blob, profile) {
            (Some(user), _) => self.storage.set_item(&self.keys.user_data, user).await?,
            (None, ProfileUpdate::Replace) => {
                self.storage.remove_item(&self.keys.user_data).await?
            }
            (None, ProfileUpdate::KeepCached) => {}
        }
        Ok(())
    }

    /// Current access token, or `None` if absent or unreadable.
    pub async fn read_access_token(&self) -> Option<String> {
        let _guard = self.lock.read().await;
        self.load_token_data().await.map(|data| data.access_token)
    }

    /// Current refresh token, or `None` if absent or unreadable.
    pub async fn read_refresh_token(&self) -> Option<String> {
        let _guard = self.lock.read().await;
        self.load_refresh_token().await
    }

    /// Full credential, read under a single lock acquisition.
    pub async fn read_credential(&self) -> Option<Credential> {
        let _guard = self.lock.read().await;
        let data = self.load_token_data().await?;
        let refresh_token = self.load_refresh_token().await;

        Some(Credential {
            access_token: data.access_token,
            refresh_token,
            expires_at: data.expires_at,
            token_type: normalize_token_type(data.token_type.as_deref()),
        })
    }

    /// Cached user profile, or `None` if absent or unreadable.
    pub async fn read_user_profile(&self) -> Option<UserProfile> {
        let _guard = self.lock.read().await;
        let raw = self.read_key(&self.keys.user_data).await?;

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(error = %e, "Stored user profile is not valid JSON, ignoring it");
                None
            }
        }
    }

    /// Remove the credential and the profile. Clearing an empty store succeeds.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.write().await;
        self.storage.multi_remove(&self.keys.all()).await?;
        tracing::info!("Session data cleared");
        Ok(())
    }

    async fn load_token_data(&self) -> Option<StoredTokenData> {
        let raw = self.read_key(&self.keys.auth_token).await?;

        match serde_json::from_str::<StoredTokenData>(&raw) {
            Ok(data) if !data.access_token.is_empty() => Some(data),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Stored token data is not valid JSON, treating as signed out"
                );
                None
            }
        }
    }

    async fn load_refresh_token(&self) -> Option<String> {
        self.read_key(&self.keys.refresh_token)
            .await
            .filter(|token| !token.is_empty())
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key, "Storage read failed, treating value as absent");
                None
            }
        }
    }
}
