// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight exchange of a refresh token for a new credential.
//!
//! Any number of concurrent `refresh()` calls share one HTTP request to the
//! refresh endpoint and observe the same outcome:
//! - the refresh work runs on its own task, so a caller that stops waiting
//!   does not cancel it for everyone else
//! - the new credential is saved (or the store cleared) before the in-flight
//!   slot is released and before any waiter is woken

use crate::error::AuthError;
use crate::models::{Credential, CredentialResponse};
use crate::services::TokenStore;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Outcome shared by every caller of one refresh.
pub type RefreshOutcome = Result<Credential, AuthError>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Where and how to call the refresh endpoint.
#[derive(Debug, Clone)]
pub struct RefreshEndpoint {
    pub url: String,
    /// Sent as the `apikey` header (Supabase anon key).
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Serializes refresh attempts into at most one in-flight request.
///
/// Cheap to clone; clones share the same in-flight slot.
#[derive(Clone)]
pub struct TokenRefresher {
    inner: Arc<RefresherInner>,
}

struct RefresherInner {
    http: reqwest::Client,
    store: Arc<TokenStore>,
    endpoint: RefreshEndpoint,
    in_flight: Mutex<Option<InFlight>>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl TokenRefresher {
    pub fn new(http: reqwest::Client, store: Arc<TokenStore>, endpoint: RefreshEndpoint) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                http,
                store,
                endpoint,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Whether a refresh is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.inner.slot().is_some()
    }

    /// Refresh the credential, joining an in-flight refresh if there is one.
    pub async fn refresh(&self) -> RefreshOutcome {
        let in_flight = {
            let mut slot = self.inner.slot();
            match (*slot).clone() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight token refresh");
                    existing
                }
                None => {
                    let started = self.start();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        in_flight.await
    }

    /// Spawn the refresh task. Must be called with the slot lock held.
    fn start(&self) -> InFlight {
        let task_inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let outcome = task_inner.perform_refresh().await;
            task_inner.slot().take();
            outcome
        });

        let join_inner = self.inner.clone();
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The task never reached its own cleanup.
                    join_inner.slot().take();
                    tracing::error!(error = %e, "Token refresh task failed");
                    Err(AuthError::RefreshFailed(format!("refresh task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl RefresherInner {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.store.read_refresh_token().await else {
            tracing::warn!("Token refresh requested but no refresh token is stored");
            return Err(AuthError::NoRefreshToken);
        };

        tracing::info!("Refreshing access token");

        let mut request = self
            .http
            .post(&self.endpoint.url)
            .timeout(self.endpoint.timeout)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            });
        if let Some(api_key) = &self.endpoint.api_key {
            request = request.header("apikey", api_key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Token refresh request failed");
            AuthError::RefreshFailed(format!("Token refresh request failed: {}", e))
        })?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body: RefreshErrorBody = response.json().await.unwrap_or_default();
            tracing::warn!(
                reason = body.error.as_deref().unwrap_or("<none>"),
                "Refresh token rejected, ending session"
            );
            if let Err(e) = self.store.clear().await {
                tracing::error!(error = %e, "Failed to clear session after refresh rejection");
            }
            return Err(AuthError::SessionExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Token refresh failed, keeping current session");
            return Err(AuthError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        let mut payload: CredentialResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("JSON parse error: {}", e)))?;

        // Servers that do not rotate refresh tokens omit it from the response.
        if payload.refresh_token.is_none() {
            payload.refresh_token = Some(refresh_token);
        }

        // A rejected payload leaves the store as it was; a failed write has
        // already cleared it.
        let credential = self.store.save_refreshed(&payload).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to save refreshed credential");
            AuthError::RefreshFailed(format!("Failed to save refreshed credential: {}", e))
        })?;

        tracing::info!(expires_at = ?credential.expires_at, "Access token refreshed");
        Ok(credential)
    }
}
