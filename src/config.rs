//! Runtime configuration
//!
//! Loaded from the environment (with `.env` support) or from a YAML file.
//! Every key has a default except the API key.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::ModelEndpoint;
use crate::client::RetryPolicy;
use crate::draft::TagMergePolicy;
use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogbookConfig {
    pub api_key: String,
    pub base_url: String,
    /// Ranked model list, primary first
    pub models: Vec<String>,
    pub timeout_seconds: u64,
    /// HTTP statuses that mean "busy, try again"
    pub transient_statuses: Vec<u16>,
    pub retry: RetryPolicy,
    pub tag_policy: TagMergePolicy,
    pub logbook_path: PathBuf,
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.0-flash".to_string(),
            ],
            timeout_seconds: 30,
            transient_statuses: vec![503],
            retry: RetryPolicy::default(),
            tag_policy: TagMergePolicy::default(),
            logbook_path: PathBuf::from("logbook.jsonl"),
        }
    }
}

impl fmt::Debug for LogbookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogbookConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("transient_statuses", &self.transient_statuses)
            .field("retry", &self.retry)
            .field("tag_policy", &self.tag_policy)
            .field("logbook_path", &self.logbook_path)
            .finish()
    }
}

impl LogbookConfig {
    /// Build from environment variables, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a YAML file; the API key falls back to `GEMINI_API_KEY`
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading logbook configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let mut config: LogbookConfig = serde_yaml::from_str(&content)?;
        config.api_key = clean_api_key(&config.api_key);

        if config.api_key.is_empty() {
            dotenvy::dotenv().ok();
            if let Ok(raw) = std::env::var("GEMINI_API_KEY") {
                config.api_key = clean_api_key(&raw);
            }
        }

        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = std::env::var("GEMINI_API_KEY") {
            self.api_key = clean_api_key(&raw);
        }
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            self.models = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = env_parse("LOGBOOK_TIMEOUT_SECS")? {
            self.timeout_seconds = secs;
        }
        if let Some(attempts) = env_parse("LOGBOOK_MAX_ATTEMPTS")? {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = env_parse("LOGBOOK_RETRY_DELAY_MS")? {
            self.retry.delay_ms = delay;
        }
        if let Some(policy) = env_parse("LOGBOOK_TAG_POLICY")? {
            self.tag_policy = policy;
        }
        if let Ok(path) = std::env::var("LOGBOOK_PATH") {
            self.logbook_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Check the configuration is usable for live requests
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.models.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_seconds".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Vec<ModelEndpoint> {
        self.models.iter().map(ModelEndpoint::new).collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Secrets pasted into env files often carry stray quotes
fn clean_api_key(raw: &str) -> String {
    raw.replace(['"', '\''], "").trim().to_string()
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
