//! HTTP mesh conversion backend (Meshy image-to-3D).
//!
//! Conversion is asynchronous on the provider side: a task is created, then
//! polled until it succeeds, fails, or the configured wait budget runs out.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::time::Instant;

use super::{MeshArtifact, MeshBackend, PollProgress};
use crate::config::PipelineConfig;
use crate::errors::BackendError;
use crate::request::{ImageRef, MeshFormat};

const API_VERSION: &str = "openapi/v1";

/// Provider-side task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued, not started.
    Pending,
    /// Conversion running.
    InProgress,
    /// Finished, model URLs available.
    Succeeded,
    /// Conversion failed.
    Failed,
    /// Task aged out before completing.
    Expired,
}

impl TaskStatus {
    /// Whether the task finished successfully.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::Succeeded
    }

    /// Whether the task terminally failed.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed | Self::Expired)
    }

    /// Parses a provider status string, defaulting unknown values to pending.
    #[must_use]
    pub fn from_provider(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Self::InProgress,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "EXPIRED" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

/// One poll of a conversion task.
#[derive(Debug, Clone)]
struct TaskSnapshot {
    status: TaskStatus,
    progress: u8,
    model_urls: HashMap<String, String>,
}

/// Mesh conversion via the Meshy image-to-3D API.
#[derive(Debug, Clone)]
pub struct MeshyBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    output_dir: PathBuf,
    timeout_seconds: u64,
    poll_interval: std::time::Duration,
}

impl MeshyBackend {
    /// Creates a backend from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.meshy_base_url.clone(),
            api_key: config.meshy_api_key.clone(),
            output_dir: config.output_dir.clone(),
            timeout_seconds: config.mesh_timeout_seconds,
            poll_interval: config.mesh_poll_interval(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{API_VERSION}/{path}", self.base_url)
    }

    /// Resolves an image reference to something the provider can fetch:
    /// remote URLs pass through, local files are inlined as data URLs.
    fn resolve_image_url(image: &ImageRef) -> Result<String, BackendError> {
        match image {
            ImageRef::Url(url) => Ok(url.clone()),
            ImageRef::Path(path) => {
                let bytes = std::fs::read(path)?;
                let mime = match path.extension().and_then(|e| e.to_str()) {
                    Some("jpg" | "jpeg") => "image/jpeg",
                    Some("webp") => "image/webp",
                    _ => "image/png",
                };
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                Ok(format!("data:{mime};base64,{encoded}"))
            }
        }
    }

    async fn create_task(&self, image_url: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.endpoint("image-to-3d"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "image_url": image_url,
                "topology": "triangle",
                "enable_pbr": true,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        // Meshy answers 200 or 202 on task creation.
        if status != 200 && status != 202 {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(Some(status), body));
        }

        let data: serde_json::Value = response.json().await?;
        data["result"]
            .as_str()
            .or_else(|| data["id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| BackendError::decode(format!("no task id in response: {data}")))
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&format!("image-to-3d/{task_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::api(Some(status.as_u16()), body));
        }

        let data: serde_json::Value = response.json().await?;
        let task_status = data["status"]
            .as_str()
            .map_or(TaskStatus::Pending, TaskStatus::from_provider);

        let model_urls = data["model_urls"]
            .as_object()
            .map(|urls| {
                urls.iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(TaskSnapshot {
            status: task_status,
            progress: data["progress"].as_u64().unwrap_or(0).min(100) as u8,
            model_urls,
        })
    }

    async fn wait_for_completion(
        &self,
        task_id: &str,
        on_progress: Option<PollProgress<'_>>,
    ) -> Result<TaskSnapshot, BackendError> {
        let started = Instant::now();
        let mut last_progress = None;

        loop {
            let snapshot = self.task_status(task_id).await?;

            if on_progress.is_some() && last_progress != Some(snapshot.progress) {
                if let Some(report) = on_progress {
                    report(snapshot.progress);
                }
                last_progress = Some(snapshot.progress);
            }

            if snapshot.status.is_complete() {
                return Ok(snapshot);
            }
            if snapshot.status.is_failed() {
                return Err(BackendError::api(
                    None,
                    format!("task {task_id} ended with status {:?}", snapshot.status),
                ));
            }

            if started.elapsed().as_secs() >= self.timeout_seconds {
                return Err(BackendError::timeout(
                    format!("task {task_id}"),
                    self.timeout_seconds,
                ));
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn download(
        &self,
        snapshot: &TaskSnapshot,
        task_id: &str,
        format: MeshFormat,
    ) -> Result<PathBuf, BackendError> {
        let url = snapshot.model_urls.get(format.as_str()).ok_or_else(|| {
            let available: Vec<&String> = snapshot.model_urls.keys().collect();
            BackendError::decode(format!(
                "format '{format}' not available; provider offered {available:?}"
            ))
        })?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::api(Some(status.as_u16()), "mesh download failed"));
        }
        let bytes = response.bytes().await?;

        let path = self.output_dir.join(format!("{task_id}.{format}"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &bytes)?;
        Ok(path)
    }
}

#[async_trait]
impl MeshBackend for MeshyBackend {
    async fn from_image(
        &self,
        image: &ImageRef,
        target_size_mm: f64,
        format: MeshFormat,
        on_progress: Option<PollProgress<'_>>,
    ) -> Result<MeshArtifact, BackendError> {
        let image_url = Self::resolve_image_url(image)?;

        let task_id = self.create_task(&image_url).await?;
        tracing::debug!(%task_id, "mesh conversion task created");

        let snapshot = self.wait_for_completion(&task_id, on_progress).await?;
        let local_path = self.download(&snapshot, &task_id, format).await?;

        let mut metadata = HashMap::new();
        metadata.insert("target_size_mm".to_string(), serde_json::json!(target_size_mm));
        metadata.insert("format".to_string(), serde_json::json!(format.as_str()));

        Ok(MeshArtifact {
            task_id,
            url: snapshot.model_urls.get(format.as_str()).cloned(),
            local_path,
            polycount: None,
            metadata,
        })
    }
}
