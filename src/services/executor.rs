// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated HTTP requests with one refresh-and-retry cycle.
//!
//! Flow for a single `execute` call:
//! 1. Read the credential; without one, fail with `NotAuthenticated` and
//!    make no request.
//! 2. Send the request with `Authorization: <token_type> <access_token>`.
//! 3. Any status other than 401 goes back to the caller untouched.
//! 4. On 401, refresh (single-flight) and resend once with the new token.
//!    The second response is returned whatever its status.

use crate::error::AuthError;
use crate::models::Credential;
use crate::services::{TokenRefresher, TokenStore};
use chrono::Duration as ChronoDuration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Description of a request that needs a bearer token.
///
/// The body is owned bytes so the request can be rebuilt for the retry.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header. An `Authorization` header set here is always replaced.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body, adding `Content-Type: application/json` unless the
    /// caller already chose a content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

/// Sends authenticated requests, refreshing the token at most once per call.
///
/// Only reads from the token store; all writes go through the refresher.
#[derive(Clone)]
pub struct AuthenticatedRequestExecutor {
    http: reqwest::Client,
    store: Arc<TokenStore>,
    refresher: TokenRefresher,
    timeout: Duration,
    /// Refresh before sending when the token expires within this margin.
    refresh_margin: Option<ChronoDuration>,
}

impl AuthenticatedRequestExecutor {
    pub fn new(
        http: reqwest::Client,
        store: Arc<TokenStore>,
        refresher: TokenRefresher,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            store,
            refresher,
            timeout,
            refresh_margin: None,
        }
    }

    /// Enable proactive refresh for tokens with a known expiry.
    pub fn with_refresh_margin(mut self, margin: ChronoDuration) -> Self {
        self.refresh_margin = Some(margin).filter(|m| *m > ChronoDuration::zero());
        self
    }

    /// Perform `req` with the current token, retrying once after a refresh
    /// if the server answers 401.
    pub async fn execute(&self, req: &RequestSpec) -> Result<Response, AuthError> {
        let Some(mut credential) = self.store.read_credential().await else {
            tracing::debug!(url = %req.url, "No access token, not sending request");
            return Err(AuthError::NotAuthenticated);
        };

        if let Some(margin) = self.refresh_margin {
            if credential.expires_within(margin) {
                credential = self.refresh_ahead_of_expiry(credential).await?;
            }
        }

        let response = self.send(req, &credential).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(
            method = %req.method,
            url = %req.url,
            "Request unauthorized, refreshing token before retry"
        );

        // The refresher saved this credential before resolving.
        let credential = self.refresher.refresh().await?;

        let retried = self.send(req, &credential).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                method = %req.method,
                url = %req.url,
                "Request still unauthorized after token refresh"
            );
        }
        Ok(retried)
    }

    /// Only a terminal session failure stops the request here; otherwise the
    /// current token is sent and the server decides.
    async fn refresh_ahead_of_expiry(
        &self,
        current: Credential,
    ) -> Result<Credential, AuthError> {
        tracing::debug!(
            expires_at = ?current.expires_at,
            "Access token expiring, refreshing ahead of request"
        );

        match self.refresher.refresh().await {
            Ok(credential) => Ok(credential),
            Err(AuthError::SessionExpired) => Err(AuthError::SessionExpired),
            Err(e) => {
                tracing::warn!(error = %e, "Proactive token refresh failed, using current token");
                Ok(current)
            }
        }
    }

    async fn send(
        &self,
        req: &RequestSpec,
        credential: &Credential,
    ) -> Result<Response, AuthError> {
        let mut authorization = HeaderValue::from_str(&credential.authorization_value())
            .map_err(|_| AuthError::Http("access token is not a valid header value".to_string()))?;
        authorization.set_sensitive(true);

        let mut headers = req.headers.clone();
        headers.insert(AUTHORIZATION, authorization);

        let mut request = self
            .http
            .request(req.method.clone(), &req.url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = &req.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        tracing::debug!(
            method = %req.method,
            url = %req.url,
            status = response.status().as_u16(),
            "Authenticated request completed"
        );
        Ok(response)
    }
}
