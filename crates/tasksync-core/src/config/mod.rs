//! Sync settings: per-account service profiles and retry tuning.
//!
//! Stored as a JSON document; a missing file means defaults. Secrets never
//! live here, profiles only name the environment variable holding the token.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::{RetryPolicy, DEFAULT_API_BASE_URL};
use crate::util::{is_http_url, non_empty_trimmed};

const SETTINGS_SCHEMA_VERSION: u32 = 1;

/// Environment variable read for an access token when a profile names none
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "TASKSYNC_ACCESS_TOKEN";

/// Environment variable selecting the account when none is passed explicitly
pub const ACCOUNT_ENV: &str = "TASKSYNC_ACCOUNT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default = "default_settings_version")]
    pub version: u32,
    #[serde(default)]
    pub default_account: Option<String>,
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountProfile>,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Where and how one account reaches its remote service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountProfile {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub access_token_env: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_settings_version() -> u32 {
    SETTINGS_SCHEMA_VERSION
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_SCHEMA_VERSION,
            default_account: None,
            accounts: BTreeMap::new(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl SyncSettings {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut settings = serde_json::from_str::<Self>(&raw)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Explicit choice, then `TASKSYNC_ACCOUNT`, then the configured default.
    pub fn resolve_account(&self, explicit: Option<&str>) -> String {
        let from_env = std::env::var(ACCOUNT_ENV).ok();
        let account = [explicit, from_env.as_deref(), self.default_account.as_deref()]
            .into_iter()
            .flatten()
            .find_map(normalize_account);
        account.unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, account: &str) -> AccountProfile {
        self.accounts.get(account).cloned().unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    fn normalize(&mut self) {
        self.default_account = self.default_account.as_deref().and_then(normalize_account);
        self.accounts = std::mem::take(&mut self.accounts)
            .into_iter()
            .filter_map(|(name, mut profile)| {
                profile.normalize();
                normalize_account(&name).map(|name| (name, profile))
            })
            .collect();
    }

    fn validate(&self) -> Result<()> {
        if self.version > SETTINGS_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "Unsupported settings version {} (expected <= {SETTINGS_SCHEMA_VERSION})",
                self.version
            )));
        }
        for (name, profile) in &self.accounts {
            if let Some(url) = &profile.api_base_url {
                if !is_http_url(url) {
                    return Err(Error::InvalidInput(format!(
                        "Account '{name}' api_base_url must include http:// or https://"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl AccountProfile {
    pub fn api_base_url(&self) -> String {
        non_empty_trimmed(self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn access_token_env(&self) -> String {
        non_empty_trimmed(self.access_token_env.clone())
            .unwrap_or_else(|| DEFAULT_ACCESS_TOKEN_ENV.to_string())
    }

    /// Read the access token from the profile's environment variable.
    pub fn access_token(&self) -> Result<String> {
        let env = self.access_token_env();
        non_empty_trimmed(std::env::var(&env).ok())
            .ok_or_else(|| Error::InvalidInput(format!("No access token found in ${env}")))
    }

    fn normalize(&mut self) {
        self.api_base_url = non_empty_trimmed(self.api_base_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.access_token_env = non_empty_trimmed(self.access_token_env.clone());
    }
}

fn normalize_account(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
