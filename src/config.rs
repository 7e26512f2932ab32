//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_STORAGE_PATH: &str = ".mini-cms/storage.json";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

pub const API_BASE_URL_ENV: &str = "MINI_CMS_API_BASE_URL";
pub const STORAGE_PATH_ENV: &str = "MINI_CMS_STORAGE_PATH";
pub const TIMEOUT_MS_ENV: &str = "MINI_CMS_TIMEOUT_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API origin without a trailing slash.
    pub base_url: String,
    pub storage_path: PathBuf,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Build a config for `base_url` with default storage path and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `MINI_CMS_API_BASE_URL`: default `http://localhost:8000`
    /// - `MINI_CMS_STORAGE_PATH`: default `.mini-cms/storage.json`
    /// - `MINI_CMS_TIMEOUT_MS`: default 15000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base = std::env::var(API_BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned());
        let storage_path = std::env::var(STORAGE_PATH_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from);
        let timeout = Duration::from_millis(env_parse_u64(TIMEOUT_MS_ENV, DEFAULT_REQUEST_TIMEOUT_MS));

        Ok(Self { base_url: normalize_base_url(&raw_base)?, storage_path, timeout })
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Trim whitespace and strip a single trailing slash.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    reqwest::Url::parse(trimmed).map_err(|e| ConfigError::InvalidBaseUrl(format!("{trimmed}: {e}")))?;
    Ok(trimmed.strip_suffix('/').unwrap_or(trimmed).to_owned())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
