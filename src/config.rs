//! Remote API configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Upper bound on the best-effort remote logout call.
    pub logout_secs: u64,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            logout_secs: DEFAULT_LOGOUT_TIMEOUT_SECS,
        }
    }
}

impl ApiTimeouts {
    #[must_use]
    pub fn logout(&self) -> Duration {
        Duration::from_secs(self.logout_secs)
    }

    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Backend root, without trailing slash (e.g. `https://api.example.com`).
    pub base_url: String,
    pub timeouts: ApiTimeouts,
}

impl ApiConfig {
    /// Build config for an explicit base URL with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not `http` or `https`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self { base_url: normalize_base_url(base_url)?, timeouts: ApiTimeouts::default() })
    }

    /// Build typed API config from environment variables.
    ///
    /// Required:
    /// - `GROWPROMISE_API_URL`
    ///
    /// Optional:
    /// - `GROWPROMISE_REQUEST_TIMEOUT_SECS`: default 15
    /// - `GROWPROMISE_CONNECT_TIMEOUT_SECS`: default 5
    /// - `GROWPROMISE_LOGOUT_TIMEOUT_SECS`: default 3
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("GROWPROMISE_API_URL").map_err(|_| ConfigError::Missing { var: "GROWPROMISE_API_URL" })?;
        let base_url = normalize_base_url(&raw)?;
        let timeouts = ApiTimeouts {
            request_secs: env_parse("GROWPROMISE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("GROWPROMISE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            logout_secs: env_parse("GROWPROMISE_LOGOUT_TIMEOUT_SECS", DEFAULT_LOGOUT_TIMEOUT_SECS),
        };
        Ok(Self { base_url, timeouts })
    }

    /// Join an endpoint path onto the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
