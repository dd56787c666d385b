//! Submission and polling of long-running remote generation tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use crate::cancel::CancelFlag;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::retry::retry_with_backoff;

/// Remote-reported task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    #[serde(alias = "PENDING")]
    Queued,
    #[serde(alias = "PROCESSING", alias = "RUNNING")]
    InProgress,
    #[serde(alias = "SUCCESS", alias = "COMPLETED")]
    Succeeded,
    #[serde(alias = "FAILURE", alias = "ERROR")]
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One status snapshot of a remote task.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTaskStatus {
    #[serde(alias = "state")]
    pub status: TaskState,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "result")]
    pub output: Option<Value>,
}

/// Wire access to the task service. The poller owns retry, candidate
/// probing and the wall-clock budget; the transport owns one HTTP shape.
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// Submit a job, returning the remote task id.
    async fn submit(&self, payload: &Value) -> Result<String>;

    /// Candidate status endpoint paths, in probe order.
    fn status_paths(&self) -> Vec<String>;

    /// Fetch status at one candidate path. `Ok(None)` means this endpoint
    /// shape does not recognize the task id.
    async fn status_at(&self, path: &str, task_id: &str) -> Result<Option<RemoteTaskStatus>>;
}

/// Submits a remote job and polls until it reaches a terminal state or the
/// wall-clock budget runs out. Every outbound call goes through the
/// backoff retrier.
pub struct TaskPoller {
    transport: Arc<dyn TaskTransport>,
    poll_interval: Duration,
    retry_attempts: u32,
    retry_initial_delay: Duration,
}

impl TaskPoller {
    pub fn new(transport: Arc<dyn TaskTransport>, config: &PipelineConfig) -> Self {
        Self {
            transport,
            poll_interval: config.poll_interval,
            retry_attempts: config.retry_attempts,
            retry_initial_delay: config.retry_initial_delay,
        }
    }

    pub async fn submit(&self, payload: &Value) -> Result<String> {
        retry_with_backoff(
            || self.transport.submit(payload),
            self.retry_attempts,
            self.retry_initial_delay,
        )
        .await
    }

    /// Probe the candidate endpoints in order, skipping shapes that do not
    /// recognize the task id.
    async fn fetch_status(&self, task_id: &str) -> Result<RemoteTaskStatus> {
        for path in self.transport.status_paths() {
            let status = retry_with_backoff(
                || self.transport.status_at(&path, task_id),
                self.retry_attempts,
                self.retry_initial_delay,
            )
            .await?;
            match status {
                Some(status) => return Ok(status),
                None => debug!("task `{task_id}` unknown at `{path}`, trying next endpoint"),
            }
        }
        Err(PipelineError::NotFound(format!(
            "task `{task_id}` not recognized by any status endpoint"
        )))
    }

    /// Poll until the task is terminal, `max_wait` elapses, or `cancel`
    /// fires.
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        max_wait: Duration,
        cancel: &CancelFlag,
    ) -> Result<Value> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let status = self.fetch_status(task_id).await?;
            match status.status {
                TaskState::Succeeded => {
                    info!("task `{task_id}` completed");
                    return Ok(status.output.unwrap_or(Value::Null));
                }
                TaskState::Failed => {
                    let reason = status
                        .error
                        .unwrap_or_else(|| "unknown remote failure".into());
                    return Err(PipelineError::Remote(format!(
                        "task `{task_id}` failed: {reason}"
                    )));
                }
                TaskState::Queued | TaskState::InProgress => {
                    if let Some(progress) = status.progress {
                        debug!("task `{task_id}` at {:.0}%", progress * 100.0);
                    }
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return Err(PipelineError::Timeout {
                    waited_ms: elapsed.as_millis() as u64,
                });
            }

            let sleep = self.poll_interval.min(max_wait - elapsed);
            tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(sleep) => {}
            }
        }
    }
}

/// HTTP transport for the mesh generation service.
pub struct HttpTaskTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
}

/// Endpoint shapes the service has shipped over time, newest first.
const STATUS_PATHS: [&str; 3] = ["/v2/tasks", "/tasks", "/task"];

impl HttpTaskTransport {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.mesh_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl TaskTransport for HttpTaskTransport {
    async fn submit(&self, payload: &Value) -> Result<String> {
        let url = format!("{}/v2/tasks", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Remote(format!("HTTP {status}: {body}")));
        }

        #[derive(Deserialize)]
        struct SubmitResponse {
            #[serde(alias = "id")]
            task_id: String,
        }

        let parsed: SubmitResponse = response.json().await?;
        Ok(parsed.task_id)
    }

    fn status_paths(&self) -> Vec<String> {
        STATUS_PATHS.iter().map(|p| p.to_string()).collect()
    }

    async fn status_at(&self, path: &str, task_id: &str) -> Result<Option<RemoteTaskStatus>> {
        let url = format!("{}{}/{}", self.base_url, path, task_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Remote(format!("HTTP {status}: {body}")));
        }

        Ok(Some(response.json().await?))
    }
}
