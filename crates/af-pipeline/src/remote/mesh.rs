//! Client for the remote image/text-to-3D service.
//!
//! Every operation submits a long-running task and waits on it through the
//! poller; the terminal payload carries the downloadable model URL and
//! texture maps.

use std::time::Duration;

use af_core::{MeshOutput, TextureMaps};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::cancel::CancelFlag;
use crate::error::{PipelineError, Result};
use crate::remote::poller::TaskPoller;

/// Options for a text/image-to-3D submission.
#[derive(Debug, Clone, Serialize)]
pub struct MeshOptions {
    pub target_polycount: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub enable_pbr: bool,
    pub topology: String,
    pub texture_resolution: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_prompt: Option<String>,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            target_polycount: 20_000,
            style: None,
            enable_pbr: true,
            topology: "triangle".to_string(),
            texture_resolution: 1024,
            negative_prompt: None,
            style_prompt: None,
        }
    }
}

/// Seam for the mesh generation back end.
#[async_trait]
pub trait MeshService: Send + Sync {
    /// Create a model from a prompt, optionally conditioned on an image.
    async fn create_model(
        &self,
        prompt: &str,
        image_url: Option<&str>,
        options: &MeshOptions,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput>;

    /// Re-target an existing model's polycount.
    async fn remesh(
        &self,
        model_url: &str,
        target_polycount: u32,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput>;

    /// Resubmit an existing model with a texture prompt.
    async fn retexture(
        &self,
        model_url: &str,
        texture_prompt: &str,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput>;
}

pub struct MeshClient {
    poller: TaskPoller,
    max_wait: Duration,
}

impl MeshClient {
    pub fn new(poller: TaskPoller, max_wait: Duration) -> Self {
        Self { poller, max_wait }
    }

    async fn run_task(&self, payload: Value, cancel: &CancelFlag) -> Result<MeshOutput> {
        let task_id = self.poller.submit(&payload).await?;
        info!("mesh task `{task_id}` submitted");
        let terminal = self
            .poller
            .wait_for_completion(&task_id, self.max_wait, cancel)
            .await?;
        parse_terminal(&terminal)
    }
}

#[async_trait]
impl MeshService for MeshClient {
    async fn create_model(
        &self,
        prompt: &str,
        image_url: Option<&str>,
        options: &MeshOptions,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput> {
        let mode = if image_url.is_some() {
            "image_to_3d"
        } else {
            "text_to_3d"
        };
        let payload = json!({
            "mode": mode,
            "prompt": prompt,
            "image_url": image_url,
            "options": options,
        });
        self.run_task(payload, cancel).await
    }

    async fn remesh(
        &self,
        model_url: &str,
        target_polycount: u32,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput> {
        let payload = json!({
            "mode": "remesh",
            "model_url": model_url,
            "target_polycount": target_polycount,
        });
        self.run_task(payload, cancel).await
    }

    async fn retexture(
        &self,
        model_url: &str,
        texture_prompt: &str,
        cancel: &CancelFlag,
    ) -> Result<MeshOutput> {
        let payload = json!({
            "mode": "retexture",
            "model_url": model_url,
            "texture_prompt": texture_prompt,
        });
        self.run_task(payload, cancel).await
    }
}

/// Map a terminal task payload onto a mesh output.
fn parse_terminal(value: &Value) -> Result<MeshOutput> {
    #[derive(Deserialize)]
    struct TerminalPayload {
        model_url: String,
        #[serde(default)]
        textures: TextureMaps,
        #[serde(default)]
        polycount: u32,
        #[serde(default, alias = "processing_time_ms")]
        processing_ms: u64,
    }

    let parsed: TerminalPayload = serde_json::from_value(value.clone())
        .map_err(|e| PipelineError::Remote(format!("malformed terminal payload: {e}")))?;

    Ok(MeshOutput {
        model_url: parsed.model_url,
        textures: parsed.textures,
        polycount: parsed.polycount,
        processing_ms: parsed.processing_ms,
    })
}
