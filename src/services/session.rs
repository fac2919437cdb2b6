// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caller-facing session API.
//!
//! `AuthSession` wires the token store, the refresher and the request
//! executor together and exposes the small surface the UI layer uses:
//! token lookup, save/clear, sign-in/sign-out and `fetch_with_auth`.

use crate::config::Config;
use crate::error::AuthError;
use crate::models::registration::{ErrorBody, RegistrationBody};
use crate::models::{ApprovalStatus, CredentialResponse, Registration, UserProfile};
use crate::services::{
    AuthenticatedRequestExecutor, RefreshEndpoint, RefreshOutcome, RequestSpec, TokenRefresher,
    TokenStore,
};
use crate::storage::{FileStorage, KeyValueStorage};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Client-side session: persisted credential plus authenticated requests.
#[derive(Clone)]
pub struct AuthSession {
    http: reqwest::Client,
    store: Arc<TokenStore>,
    refresher: TokenRefresher,
    executor: AuthenticatedRequestExecutor,
    auth_url: String,
    register_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl AuthSession {
    /// Build a session persisted to the file named in the configuration.
    pub fn from_config(config: &Config) -> Self {
        let storage = Arc::new(FileStorage::new(&config.storage_path));
        Self::with_storage(config, storage)
    }

    /// Build a session on top of any key-value storage.
    pub fn with_storage(config: &Config, storage: Arc<dyn KeyValueStorage>) -> Self {
        let http = reqwest::Client::new();
        let store = Arc::new(TokenStore::new(storage, config.storage_keys()));

        let refresher = TokenRefresher::new(
            http.clone(),
            store.clone(),
            RefreshEndpoint {
                url: config.refresh_url(),
                api_key: Some(config.supabase_anon_key.clone()).filter(|k| !k.is_empty()),
                timeout: config.request_timeout,
            },
        );

        let mut executor = AuthenticatedRequestExecutor::new(
            http.clone(),
            store.clone(),
            refresher.clone(),
            config.request_timeout,
        );
        let margin_secs = config
            .token_refresh_margin_secs
            .clamp(0, crate::config::MAX_REFRESH_MARGIN_SECS);
        if let Some(margin) = chrono::Duration::try_seconds(margin_secs) {
            executor = executor.with_refresh_margin(margin);
        }

        tracing::debug!(auth_url = %config.auth_url(), "Auth session initialized");

        Self {
            http,
            store,
            refresher,
            executor,
            auth_url: config.auth_url(),
            register_url: config.api_url("/auth/register"),
            api_key: Some(config.supabase_anon_key.clone()).filter(|k| !k.is_empty()),
            timeout: config.request_timeout,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    pub fn executor(&self) -> &AuthenticatedRequestExecutor {
        &self.executor
    }

    // ─── Stored State ────────────────────────────────────────────────────────

    pub async fn get_auth_token(&self) -> Option<String> {
        self.store.read_access_token().await
    }

    /// Persist a sign-in/registration response, replacing any cached profile.
    /// Returns `false` on failure.
    pub async fn save_auth_data(&self, response: &CredentialResponse) -> bool {
        match self.store.save(response).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to save auth data");
                false
            }
        }
    }

    /// Remove all stored auth data. Returns `false` on failure.
    pub async fn clear_auth_data(&self) -> bool {
        match self.store.clear().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to clear auth data");
                false
            }
        }
    }

    pub async fn get_user_data(&self) -> Option<UserProfile> {
        self.store.read_user_profile().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store.read_access_token().await.is_some()
    }

    // ─── Requests ────────────────────────────────────────────────────────────

    /// Send an authenticated request (see `AuthenticatedRequestExecutor`).
    pub async fn fetch_with_auth(
        &self,
        req: &RequestSpec,
    ) -> Result<reqwest::Response, AuthError> {
        self.executor.execute(req).await
    }

    /// Authenticated GET that expects a JSON body on success.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        let response = self.fetch_with_auth(&RequestSpec::get(url)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Http(format!("JSON parse error: {}", e)))
    }

    /// Force a refresh (single-flight with any refresh already running).
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresher.refresh().await
    }

    // ─── Sign-in / Sign-out ──────────────────────────────────────────────────

    /// Sign in with email and password and persist the resulting session.
    ///
    /// A 403 naming a pending or rejected account maps to
    /// `AccountPending`/`AccountRejected`; nothing is stored in that case.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, AuthError> {
        let mut request = self
            .http
            .post(format!("{}/token?grant_type=password", self.auth_url))
            .timeout(self.timeout)
            .json(&PasswordGrant { email, password });
        if let Some(api_key) = &self.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Http(format!("Sign-in request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            tracing::info!(status = %status, "Sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }
        if status == StatusCode::FORBIDDEN {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(match body.denied_status() {
                Some(ApprovalStatus::Pending) => {
                    tracing::info!("Sign-in refused, account pending approval");
                    AuthError::AccountPending
                }
                Some(ApprovalStatus::Rejected) => {
                    tracing::info!("Sign-in refused, account rejected");
                    AuthError::AccountRejected
                }
                _ => AuthError::Http(format!(
                    "HTTP {}: {}",
                    status,
                    body.reason().unwrap_or_default()
                )),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http(format!("HTTP {}: {}", status, body)));
        }

        let payload: CredentialResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Http(format!("Failed to parse sign-in response: {}", e)))?;

        self.store.save(&payload).await?;

        tracing::info!(
            user_id = payload.user.as_ref().map(|u| u.id.as_str()).unwrap_or("<unknown>"),
            "Signed in"
        );
        Ok(payload.user)
    }

    /// Create a staff account through the RH backend.
    ///
    /// New accounts normally wait for administrator approval and no session
    /// is returned. If the response does carry an access token, it is saved
    /// like a sign-in.
    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, AuthError> {
        let response = self
            .http
            .post(&self.register_url)
            .timeout(self.timeout)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(|e| AuthError::Http(format!("Registration request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let reason = body
                .reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status));
            tracing::info!(status = %status, "Registration rejected");
            return Err(AuthError::RegistrationFailed(reason));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Http(format!("HTTP {}: {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::Http(format!("Failed to parse registration response: {}", e)))?;
        let info: RegistrationBody = serde_json::from_value(body.clone()).unwrap_or_default();

        let has_session = body
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|token| !token.trim().is_empty());
        let user = if has_session {
            let payload: CredentialResponse = serde_json::from_value(body).map_err(|e| {
                AuthError::Http(format!("Failed to parse registration session: {}", e))
            })?;
            self.store.save(&payload).await?;
            payload.user
        } else {
            None
        };

        let registration = Registration {
            status: info.approval_status(),
            message: info.message,
            user,
            signed_in: has_session,
        };
        tracing::info!(
            status = ?registration.status,
            signed_in = registration.signed_in,
            "Account registered"
        );
        Ok(registration)
    }

    /// Revoke the session remotely (best effort) and clear local state.
    ///
    /// Local data is cleared even when the remote call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(credential) = self.store.read_credential().await {
            let mut request = self
                .http
                .post(format!("{}/logout", self.auth_url))
                .timeout(self.timeout)
                .header(AUTHORIZATION, credential.authorization_value());
            if let Some(api_key) = &self.api_key {
                request = request.header("apikey", api_key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Remote session revoked");
                }
                Ok(response) => {
                    tracing::warn!(
                        status = %response.status(),
                        "Remote sign-out rejected, clearing locally"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote sign-out failed, clearing locally");
                }
            }
        }

        self.store.clear().await?;
        tracing::info!("Signed out");
        Ok(())
    }
}
