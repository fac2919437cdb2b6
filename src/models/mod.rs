// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the session layer.

pub mod credential;
pub mod registration;
pub mod user;

pub use credential::{normalize_token_type, Credential, CredentialResponse, DEFAULT_TOKEN_TYPE};
pub use registration::{ApprovalStatus, Registration};
pub use user::UserProfile;
