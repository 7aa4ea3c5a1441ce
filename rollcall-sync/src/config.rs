use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SYNC_TAG: &str = "sync-attendance";

fn default_tag() -> String {
    DEFAULT_SYNC_TAG.to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the backend; records are posted to `{backend_url}/sync`.
    pub backend_url: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// How the host re-fires a failed sync registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 30_000,
            max_delay_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based): doubles each
    /// time, capped at `max_delay_ms`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl SyncConfig {
    pub fn new(backend_url: &str) -> Result<Self, SyncError> {
        let mut config = SyncConfig {
            backend_url: backend_url.to_string(),
            tag: default_tag(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `{data_dir}/sync.json`, falling back to the environment.
    ///
    /// Required: `backend_url` in the file, or ROLLCALL_BACKEND_URL
    /// Optional: ROLLCALL_SYNC_TAG, ROLLCALL_SYNC_TIMEOUT_SECS
    pub fn load(data_dir: &Path) -> Result<Self, SyncError> {
        let sync_json = data_dir.join("sync.json");

        if sync_json.exists() {
            match std::fs::read_to_string(&sync_json) {
                Ok(content) => match serde_json::from_str::<SyncConfig>(&content) {
                    Ok(mut config) => {
                        config.validate()?;
                        tracing::info!(
                            "Loaded sync config: backend_url={}, tag={}",
                            config.backend_url,
                            config.tag
                        );
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse sync.json: {}, using environment", e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read sync.json: {}, using environment", e);
                }
            }
        }

        Self::from_env()
    }

    pub fn from_env() -> Result<Self, SyncError> {
        let backend_url = std::env::var("ROLLCALL_BACKEND_URL").map_err(|_| {
            SyncError::Config("ROLLCALL_BACKEND_URL is required (or backend_url in sync.json)".into())
        })?;

        let mut config = SyncConfig::new(&backend_url)?;

        if let Ok(tag) = std::env::var("ROLLCALL_SYNC_TAG") {
            config.tag = tag;
        }
        if let Ok(raw) = std::env::var("ROLLCALL_SYNC_TIMEOUT_SECS") {
            config.request_timeout_secs = raw.parse().map_err(|_| {
                SyncError::Config(format!("Invalid ROLLCALL_SYNC_TIMEOUT_SECS: {}", raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), SyncError> {
        let parsed = url::Url::parse(&self.backend_url).map_err(|e| {
            SyncError::Config(format!("Invalid backend_url {}: {}", self.backend_url, e))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SyncError::Config(format!(
                "backend_url must be http or https, got: {}",
                self.backend_url
            )));
        }
        self.backend_url = self.backend_url.trim_end_matches('/').to_string();

        if self.tag.trim().is_empty() {
            return Err(SyncError::Config("sync tag must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn sync_endpoint(&self) -> String {
        format!("{}/sync", self.backend_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
