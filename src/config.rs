//! Session configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use crate::storage::StorageKeys;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `TOKEN_REFRESH_MARGIN_SECS` (one day).
pub const MAX_REFRESH_MARGIN_SECS: i64 = 86_400;

/// Session configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Supabase project URL, e.g. `https://abcdefgh.supabase.co`
    pub supabase_url: String,
    /// Supabase anon key, sent as `apikey` on auth calls
    pub supabase_anon_key: String,
    /// Base URL of the RH backend API
    pub api_base_url: String,
    /// File holding the persisted session
    pub storage_path: PathBuf,
    /// Timeout applied to every network call
    pub request_timeout: Duration,
    /// Refresh this many seconds before a known expiry (0 disables)
    pub token_refresh_margin_secs: i64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            api_base_url: "http://localhost:5000".to_string(),
            storage_path: PathBuf::from(".rh-session.json"),
            request_timeout: Duration::from_secs(15),
            token_refresh_margin_secs: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let supabase_url = env::var("SUPABASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?;
        url::Url::parse(&supabase_url)
            .map_err(|e| ConfigError::Invalid("SUPABASE_URL", e.to_string()))?;

        Ok(Self {
            supabase_url,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_ANON_KEY"))?,
            api_base_url: env::var("API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            storage_path: env::var("AUTH_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".rh-session.json")),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(15),
            ),
            token_refresh_margin_secs: parse_refresh_margin(
                env::var("TOKEN_REFRESH_MARGIN_SECS").ok().as_deref(),
            )?,
        })
    }

    /// Supabase Auth base URL.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    pub fn refresh_url(&self) -> String {
        format!("{}/token?grant_type=refresh_token", self.auth_url())
    }

    /// Absolute URL for a backend API path such as `/formulario/incidencias`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Storage keys derived from the project ref (first label of the host).
    pub fn storage_keys(&self) -> StorageKeys {
        let project_ref = url::Url::parse(&self.supabase_url)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .and_then(|host| host.split('.').next())
                    .map(str::to_string)
            })
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "local".to_string());

        StorageKeys::for_project(&project_ref)
    }
}

/// Unset means 0 (disabled). Values outside `0..=MAX_REFRESH_MARGIN_SECS`
/// are rejected.
fn parse_refresh_margin(raw: Option<&str>) -> Result<i64, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(0);
    };

    let secs = raw
        .parse::<i64>()
        .map_err(|e| ConfigError::Invalid("TOKEN_REFRESH_MARGIN_SECS", e.to_string()))?;
    if !(0..=MAX_REFRESH_MARGIN_SECS).contains(&secs) {
        return Err(ConfigError::Invalid(
            "TOKEN_REFRESH_MARGIN_SECS",
            format!("{} is outside 0..={}", secs, MAX_REFRESH_MARGIN_SECS),
        ));
    }
    Ok(secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
