// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential model and the login/refresh response payload.

use super::UserProfile;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token type used when the server does not send one.
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// Current authentication state. Only exists with a non-empty access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    /// Absent means the session cannot be refreshed.
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    pub expires_at: Option<i64>,
    /// Always lowercase
    pub token_type: String,
}

impl Credential {
    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Whether the token expires within `margin` from now.
    ///
    /// Without a known expiry this is always false; the server decides.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .is_some_and(|expires_at| match Utc::now().checked_add_signed(margin) {
                Some(deadline) => deadline >= expires_at,
                None => true,
            })
    }
}

/// Normalize a server-provided token type to its canonical lowercase form.
pub fn normalize_token_type(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string())
}

/// Body of a successful sign-in or refresh response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Lifetime in seconds, used when `expires_at` is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl CredentialResponse {
    /// Build the credential described by this response.
    ///
    /// Returns `None` if the access token is empty. An `expires_in` too large
    /// to represent is treated as an unknown expiry.
    pub fn to_credential(&self) -> Option<Credential> {
        if self.access_token.trim().is_empty() {
            return None;
        }

        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .and_then(|secs| Utc::now().timestamp().checked_add(secs))
        });

        Some(Credential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone().filter(|t| !t.is_empty()),
            expires_at,
            token_type: normalize_token_type(self.token_type.as_deref()),
        })
    }
}

/// Token blob persisted under the auth-token key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredTokenData {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl From<&Credential> for StoredTokenData {
    fn from(credential: &Credential) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            expires_at: credential.expires_at,
            token_type: Some(credential.token_type.clone()),
        }
    }
}
