//! Application configuration management.
//!
//! Holds the backend base URL, request timeout and last used username.
//! Stored at `~/.config/mentorlink/config.json`; the base URL can be
//! overridden with `MENTORLINK_API_URL` at run time or build time.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "mentorlink";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "MENTORLINK_API_URL";

/// Base URL used when nothing else is configured
const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub last_username: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Config pointing at `base_url`, everything else default.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    /// Backend base URL without a trailing slash.
    ///
    /// Resolution order: environment, config file, build-time value, default.
    pub fn api_base_url(&self) -> String {
        let env = std::env::var(API_URL_ENV).ok().filter(|v| !v.trim().is_empty());
        self.resolve_base_url(env)
    }

    fn resolve_base_url(&self, env: Option<String>) -> String {
        let url = env
            .or_else(|| self.api_base_url.clone())
            .or_else(|| option_env!("MENTORLINK_API_URL").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url.trim().trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}
