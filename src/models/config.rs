// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::BackoffPolicy;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bulletin provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Sync cadence and per-cycle behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// Push delivery settings
    #[serde(default)]
    pub push: PushConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.provider.endpoint.trim().is_empty() {
            return Err(AppError::validation("provider.endpoint is empty"));
        }
        if self.provider.user_agent.trim().is_empty() {
            return Err(AppError::validation("provider.user_agent is empty"));
        }
        if self.provider.timeout_secs == 0 {
            return Err(AppError::validation("provider.timeout_secs must be > 0"));
        }
        if self.provider.history_timeout_secs == 0 {
            return Err(AppError::validation(
                "provider.history_timeout_secs must be > 0",
            ));
        }
        if self.provider.retry.max_attempts == 0 {
            return Err(AppError::validation(
                "provider.retry.max_attempts must be > 0",
            ));
        }
        if self.sync.interval_mins == 0 {
            return Err(AppError::validation("sync.interval_mins must be > 0"));
        }
        if self.sync.max_concurrent == 0 {
            return Err(AppError::validation("sync.max_concurrent must be > 0"));
        }
        if self.push.endpoint.trim().is_empty() {
            return Err(AppError::validation("push.endpoint is empty"));
        }
        if self.push.retry.max_attempts == 0 {
            return Err(AppError::validation("push.retry.max_attempts must be > 0"));
        }
        Ok(())
    }
}

/// Bulletin provider endpoint and fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bulletin endpoint URL; the language is appended as `?lang=`.
    #[serde(default = "defaults::provider_endpoint")]
    pub endpoint: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Default language variant to ingest
    #[serde(default = "defaults::language")]
    pub language: String,

    /// Request timeout for the live sync fetch, in seconds
    #[serde(default = "defaults::provider_timeout")]
    pub timeout_secs: u64,

    /// Longer timeout for historical/back-fill fetches, in seconds
    #[serde(default = "defaults::history_timeout")]
    pub history_timeout_secs: u64,

    /// Retry behavior for transport failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::provider_endpoint(),
            user_agent: defaults::user_agent(),
            language: defaults::language(),
            timeout_secs: defaults::provider_timeout(),
            history_timeout_secs: defaults::history_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Sync cadence and per-cycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minutes between full sync cycles
    #[serde(default = "defaults::sync_interval")]
    pub interval_mins: u64,

    /// Seconds between reminder-due checks
    #[serde(default = "defaults::reminder_tick")]
    pub reminder_tick_secs: u64,

    /// Maximum concurrent per-location status computations
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_mins: defaults::sync_interval(),
            reminder_tick_secs: defaults::reminder_tick(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Push delivery endpoint and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push provider endpoint URL
    #[serde(default = "defaults::push_endpoint")]
    pub endpoint: String,

    /// Server key sent as the Authorization header
    #[serde(default)]
    pub api_key: String,

    /// Request timeout for delivery calls, in seconds
    #[serde(default = "defaults::push_timeout")]
    pub timeout_secs: u64,

    /// Retry behavior for failed change dispatches
    #[serde(default = "defaults::push_retry")]
    pub retry: RetryConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::push_endpoint(),
            api_key: String::new(),
            timeout_secs: defaults::push_timeout(),
            retry: defaults::push_retry(),
        }
    }
}

/// Retry knobs, convertible into a [`BackoffPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::retry_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::retry_base_delay")]
    pub base_delay_secs: u64,

    #[serde(default = "defaults::retry_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::retry_attempts(),
            base_delay_secs: defaults::retry_base_delay(),
            multiplier: defaults::retry_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Backoff policy described by this config.
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.base_delay_secs),
            multiplier: self.multiplier,
        }
    }
}

mod defaults {
    use super::RetryConfig;

    // Provider defaults
    pub fn provider_endpoint() -> String {
        "https://bulletin.example.org/api/latest".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; lawinenwacht/1.0)".into()
    }
    pub fn language() -> String {
        "de".into()
    }
    pub fn provider_timeout() -> u64 {
        30
    }
    pub fn history_timeout() -> u64 {
        90
    }

    // Sync defaults
    pub fn sync_interval() -> u64 {
        30
    }
    pub fn reminder_tick() -> u64 {
        60
    }
    pub fn max_concurrent() -> usize {
        5
    }

    // Push defaults
    pub fn push_endpoint() -> String {
        "https://fcm.googleapis.com/fcm/send".into()
    }
    pub fn push_timeout() -> u64 {
        15
    }
    pub fn push_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: retry_attempts(),
            base_delay_secs: 60,
            multiplier: 1.0,
        }
    }

    // Retry defaults (provider fetch)
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_base_delay() -> u64 {
        1
    }
    pub fn retry_multiplier() -> f64 {
        2.0
    }
}
