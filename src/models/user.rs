//! Cached user profile.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of the signed-in user, cached next to the credential for
/// offline display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Auth provider user ID
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Any other fields the server sent (metadata, role, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
