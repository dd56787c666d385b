use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Pipeline configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub image_base_url: String,
    pub mesh_base_url: String,
    /// Per-request timeout on every direct HTTP call (submission included).
    pub request_timeout: Duration,
    /// Sleep between status polls of a long-running remote task.
    pub poll_interval: Duration,
    /// Wall-clock budget for `wait_for_completion`.
    pub max_wait: Duration,
    pub retry_attempts: u32,
    pub retry_initial_delay: Duration,
    pub cache_enabled: bool,
    pub cache_max_bytes: usize,
    pub cache_default_ttl: Duration,
    /// How many requests run concurrently within one batch window.
    pub batch_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            image_base_url: "http://127.0.0.1:5000".to_string(),
            mesh_base_url: "http://127.0.0.1:5001".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
            retry_attempts: 3,
            retry_initial_delay: Duration::from_secs(1),
            cache_enabled: true,
            cache_max_bytes: 64 * 1024 * 1024,
            cache_default_ttl: Duration::from_secs(3600),
            batch_window: 5,
        }
    }
}

impl PipelineConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        config.api_key = env::var("ASSETFORGE_API_KEY")
            .map_err(|_| PipelineError::Validation("ASSETFORGE_API_KEY is not set".into()))?;

        if let Ok(url) = env::var("ASSETFORGE_IMAGE_URL") {
            config.image_base_url = url;
        }
        if let Ok(url) = env::var("ASSETFORGE_MESH_URL") {
            config.mesh_base_url = url;
        }
        if let Some(secs) = env_parse::<u64>("ASSETFORGE_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("ASSETFORGE_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("ASSETFORGE_MAX_WAIT_SECS")? {
            config.max_wait = Duration::from_secs(secs);
        }
        if let Some(attempts) = env_parse::<u32>("ASSETFORGE_RETRY_ATTEMPTS")? {
            config.retry_attempts = attempts;
        }
        if let Some(enabled) = env_parse::<bool>("ASSETFORGE_CACHE_ENABLED")? {
            config.cache_enabled = enabled;
        }
        if let Some(bytes) = env_parse::<usize>("ASSETFORGE_CACHE_MAX_BYTES")? {
            config.cache_max_bytes = bytes;
        }
        if let Some(secs) = env_parse::<u64>("ASSETFORGE_CACHE_TTL_SECS")? {
            config.cache_default_ttl = Duration::from_secs(secs);
        }
        if let Some(window) = env_parse::<usize>("ASSETFORGE_BATCH_WINDOW")? {
            config.batch_window = window.max(1);
        }

        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| PipelineError::Validation(format!("{key} is malformed: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_wait, Duration::from_secs(300));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.batch_window, 5);
        assert!(config.cache_enabled);
    }
}
