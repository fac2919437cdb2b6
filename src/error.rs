// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the session layer.
//!
//! `AuthError` is `Clone` so that a single refresh outcome can be handed to
//! every caller that waited on it.

/// Errors surfaced to callers of the session API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Session expired, sign in again")]
    SessionExpired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account exists but an administrator has not approved it yet.
    #[error("Account pending administrator approval")]
    AccountPending,

    #[error("Account rejected, contact the administrator")]
    AccountRejected,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl AuthError {
    /// True when the only way forward is a new sign-in.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated | AuthError::NoRefreshToken | AuthError::SessionExpired
        )
    }

    /// True when retrying later may succeed without user interaction.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::RefreshFailed(_) | AuthError::Http(_))
    }
}

/// Failures of the underlying key-value storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid credential data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, AuthError>;
