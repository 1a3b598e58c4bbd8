//! Pipeline configuration.
//!
//! Configuration is constructed explicitly, from the environment via
//! [`PipelineConfig::from_env`] or as a literal, and passed into the
//! orchestrator's constructor. There is no ambient global state, so tests
//! can inject whatever they need per run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ValidationError;
use crate::request::MeshFormat;

/// Pipeline configuration.
///
/// Read-only for the lifetime of a [`crate::pipeline::Pipeline`]; safe to
/// share across concurrent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Google Gemini API key (primary image backend).
    #[serde(default)]
    pub gemini_api_key: String,
    /// fal.ai API key (fallback image backend).
    #[serde(default)]
    pub fal_key: String,
    /// fal.ai API base URL.
    #[serde(default = "default_fal_base_url")]
    pub fal_base_url: String,
    /// Meshy API key (image-to-3D conversion).
    #[serde(default)]
    pub meshy_api_key: String,
    /// Meshy API base URL.
    #[serde(default = "default_meshy_base_url")]
    pub meshy_base_url: String,
    /// Shapeways OAuth client ID (print service).
    #[serde(default)]
    pub shapeways_client_id: String,
    /// Shapeways OAuth client secret.
    #[serde(default)]
    pub shapeways_client_secret: String,
    /// Shapeways API base URL.
    #[serde(default = "default_shapeways_base_url")]
    pub shapeways_base_url: String,
    /// Directory for generated files and persisted run results.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Default output mesh format.
    #[serde(default = "default_mesh_format")]
    pub default_mesh_format: MeshFormat,
    /// Default model height in millimeters.
    #[serde(default = "default_size_mm")]
    pub default_size_mm: f64,
    /// Wait budget for mesh conversion polling.
    #[serde(default = "default_mesh_timeout")]
    pub mesh_timeout_seconds: u64,
    /// Interval between mesh conversion status polls.
    #[serde(default = "default_poll_interval")]
    pub mesh_poll_interval_seconds: f64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: f64,
}

fn default_fal_base_url() -> String {
    "https://fal.run".to_string()
}

fn default_meshy_base_url() -> String {
    "https://api.meshy.ai".to_string()
}

fn default_shapeways_base_url() -> String {
    "https://api.shapeways.com".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_mesh_format() -> MeshFormat {
    MeshFormat::Stl
}

fn default_size_mm() -> f64 {
    50.0
}

fn default_mesh_timeout() -> u64 {
    600
}

fn default_poll_interval() -> f64 {
    5.0
}

fn default_http_timeout() -> f64 {
    120.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            fal_key: String::new(),
            fal_base_url: default_fal_base_url(),
            meshy_api_key: String::new(),
            meshy_base_url: default_meshy_base_url(),
            shapeways_client_id: String::new(),
            shapeways_client_secret: String::new(),
            shapeways_base_url: default_shapeways_base_url(),
            output_dir: default_output_dir(),
            default_mesh_format: default_mesh_format(),
            default_size_mm: default_size_mm(),
            mesh_timeout_seconds: default_mesh_timeout(),
            mesh_poll_interval_seconds: default_poll_interval(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from the environment.
    ///
    /// A `.env` file in the working directory is read first when present.
    /// Unset variables fall back to defaults; an unparseable
    /// `DEFAULT_MESH_FORMAT` is rejected.
    pub fn from_env() -> Result<Self, ValidationError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(v) = read("GEMINI_API_KEY") {
            config.gemini_api_key = v;
        }
        if let Some(v) = read("FAL_KEY") {
            config.fal_key = v;
        }
        if let Some(v) = read("FAL_BASE_URL") {
            config.fal_base_url = v;
        }
        if let Some(v) = read("MESHY_API_KEY") {
            config.meshy_api_key = v;
        }
        if let Some(v) = read("MESHY_BASE_URL") {
            config.meshy_base_url = v;
        }
        if let Some(v) = read("SHAPEWAYS_CLIENT_ID") {
            config.shapeways_client_id = v;
        }
        if let Some(v) = read("SHAPEWAYS_CLIENT_SECRET") {
            config.shapeways_client_secret = v;
        }
        if let Some(v) = read("SHAPEWAYS_BASE_URL") {
            config.shapeways_base_url = v;
        }
        if let Some(v) = read("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v);
        }
        if let Some(v) = read("DEFAULT_MESH_FORMAT") {
            config.default_mesh_format = v.parse()?;
        }
        if let Some(v) = read("DEFAULT_SIZE_MM").and_then(|v| v.parse().ok()) {
            config.default_size_mm = v;
        }
        if let Some(v) = read("MESH_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            config.mesh_timeout_seconds = v;
        }

        Ok(config)
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the mesh conversion wait budget.
    #[must_use]
    pub fn with_mesh_timeout_seconds(mut self, seconds: u64) -> Self {
        self.mesh_timeout_seconds = seconds;
        self
    }

    /// Sets the mesh conversion poll interval.
    #[must_use]
    pub fn with_mesh_poll_interval_seconds(mut self, seconds: f64) -> Self {
        self.mesh_poll_interval_seconds = seconds;
        self
    }

    /// Whether any image generation backend is configured.
    #[must_use]
    pub fn has_image_gen(&self) -> bool {
        !self.gemini_api_key.is_empty() || !self.fal_key.is_empty()
    }

    /// Whether mesh conversion is configured.
    #[must_use]
    pub fn has_meshy(&self) -> bool {
        !self.meshy_api_key.is_empty()
    }

    /// Whether the print service is configured.
    #[must_use]
    pub fn has_shapeways(&self) -> bool {
        !self.shapeways_client_id.is_empty() && !self.shapeways_client_secret.is_empty()
    }

    /// Names the credentials still missing for a full prompt-to-quote run.
    #[must_use]
    pub fn missing_for_pipeline(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.has_image_gen() {
            missing.push("image generation (GEMINI_API_KEY or FAL_KEY)".to_string());
        }
        if !self.has_meshy() {
            missing.push("mesh conversion (MESHY_API_KEY)".to_string());
        }
        if !self.has_shapeways() {
            missing.push(
                "print service (SHAPEWAYS_CLIENT_ID, SHAPEWAYS_CLIENT_SECRET)".to_string(),
            );
        }
        missing
    }

    /// The HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.http_timeout_seconds)
    }

    /// The mesh poll interval as a [`Duration`].
    #[must_use]
    pub fn mesh_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.mesh_poll_interval_seconds)
    }
}
