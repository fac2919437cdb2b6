// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration and approval responses.

use super::UserProfile;
use serde::Deserialize;

/// Approval state of a staff account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Server message meant for the user.
    pub message: Option<String>,
    /// Absent if the server did not report one.
    pub status: Option<ApprovalStatus>,
    /// Profile from the response, if the server signed the user in.
    pub user: Option<UserProfile>,
    /// Whether a session was created and saved.
    pub signed_in: bool,
}

/// Body of a successful registration, before any session is extracted.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegistrationBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RegistrationBody {
    /// Unknown status strings are reported as absent.
    pub fn approval_status(&self) -> Option<ApprovalStatus> {
        self.status.as_deref().and_then(|s| {
            serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase())).ok()
        })
    }
}

/// Error body returned by the RH backend and Supabase Auth.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorBody {
    pub fn reason(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error_description.as_deref())
            .filter(|r| !r.trim().is_empty())
    }

    /// Approval state named by a 403 from the login endpoint, if any.
    ///
    /// The backend words these in Spanish ("pendiente", "rechazada").
    pub fn denied_status(&self) -> Option<ApprovalStatus> {
        let reason = self.reason()?.to_lowercase();
        if reason.contains("pendiente") || reason.contains("pending") {
            Some(ApprovalStatus::Pending)
        } else if reason.contains("rechazada") || reason.contains("rejected") {
            Some(ApprovalStatus::Rejected)
        } else {
            None
        }
    }
}
