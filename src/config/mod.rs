use serde::Deserialize;
use std::time::Duration;

use crate::services::fetcher::DEFAULT_MAX_BODY_BYTES;
use crate::services::reconcile::LoopSettings;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Cloudflare account ID
    pub cf_account_id: String,

    /// Cloudflare Workers AI API token
    pub cf_api_token: String,

    /// Workers AI image-to-text model used for captions
    #[serde(default = "default_caption_model")]
    pub caption_model: String,

    /// Records pulled per eligibility query
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout applied to every manifest and image download
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Largest manifest or image body accepted, in bytes
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: usize,

    /// Backoff when no records are eligible or a cycle fails
    #[serde(default = "default_sleep_interval_secs")]
    pub sleep_interval_secs: u64,

    /// Timeout for a single Workers AI inference call
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,
}

fn default_caption_model() -> String {
    "@cf/llava-hf/llava-1.5-7b-hf".to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_fetch_max_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_sleep_interval_secs() -> u64 {
    30
}

fn default_inference_timeout_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the loop spin or never make progress.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("BATCH_SIZE must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("FETCH_TIMEOUT_SECS must be at least 1".into()));
        }
        if self.fetch_max_bytes == 0 {
            return Err(ConfigError::Invalid("FETCH_MAX_BYTES must be at least 1".into()));
        }
        if self.sleep_interval_secs == 0 {
            return Err(ConfigError::Invalid("SLEEP_INTERVAL_SECS must be at least 1".into()));
        }
        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "INFERENCE_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            batch_size: self.batch_size,
            sleep_interval: Duration::from_secs(self.sleep_interval_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
