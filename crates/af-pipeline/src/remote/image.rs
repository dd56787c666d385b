//! Client for the remote image synthesis service.

use std::time::Duration;

use af_core::ImageOutput;
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Seam for the image synthesis back end.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ImageOutput>;
}

pub struct ImageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(alias = "image_url")]
    url: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
}

impl ImageClient {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.image_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl ImageService for ImageClient {
    async fn generate(&self, prompt: &str) -> Result<ImageOutput> {
        let url = format!("{}/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ImageRequest {
                prompt,
                width: 1024,
                height: 1024,
            })
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Remote(format!("HTTP {status}: {body}")));
        }

        let parsed: ImageResponse = response.json().await?;
        info!("image generated at {}", parsed.url);

        Ok(ImageOutput {
            url: parsed.url,
            provider_model: parsed.model.unwrap_or_else(|| "unknown".into()),
            resolution: parsed.resolution.unwrap_or_else(|| "1024x1024".into()),
            generated_at: Utc::now(),
        })
    }
}
