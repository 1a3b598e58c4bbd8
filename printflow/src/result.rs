//! Pipeline result types.
//!
//! `PipelineResult` is the aggregated record of a run: an append-only,
//! ordered list of completed stage results, references to every intermediate
//! artifact, and the terminal error when the run stopped early. Its JSON
//! form is a durable contract: field names and stage identifiers are parsed
//! by external tooling and must remain stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::backends::{ImageArtifact, Material, MeshArtifact, ModelUpload, PriceSheet};
use crate::errors::{ErrorKind, PersistenceError, StageFailure};
use crate::mesh::ValidationReport;
use crate::request::{ImageStyle, MeshFormat, PipelineRequest};

/// Pipeline execution stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Text prompt to 2D image.
    ImageGeneration,
    /// 2D image to 3D mesh.
    MeshConversion,
    /// Local mesh checks (advisory, never blocking).
    MeshValidation,
    /// Mesh upload to the print service.
    PrintUpload,
    /// Material pricing for the uploaded model.
    Pricing,
}

impl PipelineStage {
    /// Stable identifier used in serialized output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageGeneration => "image_generation",
            Self::MeshConversion => "mesh_conversion",
            Self::MeshValidation => "mesh_validation",
            Self::PrintUpload => "print_upload",
            Self::Pricing => "pricing",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a stage in serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The stage ran to completion.
    Completed,
    /// The stage failed.
    Failed,
}

/// Stage-specific payload carried by a [`StageResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StagePayload {
    /// Image generation output.
    Image(ImageArtifact),
    /// Mesh conversion output.
    Mesh(MeshArtifact),
    /// Local validation report.
    Validation(ValidationReport),
    /// Print-service upload record.
    Upload(ModelUpload),
    /// Material price sheet.
    Pricing(PriceSheet),
}

/// The recorded outcome of one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage this is.
    pub stage: PipelineStage,
    /// Stage outcome.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Stage-specific output, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StagePayload>,
    /// Error message, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    /// Creates a completed stage result.
    #[must_use]
    pub fn completed(
        stage: PipelineStage,
        started_at: DateTime<Utc>,
        payload: StagePayload,
    ) -> Self {
        Self {
            stage,
            status: StageStatus::Completed,
            started_at,
            ended_at: Utc::now(),
            payload: Some(payload),
            error: None,
        }
    }

    /// Creates a failed stage result.
    #[must_use]
    pub fn failed(
        stage: PipelineStage,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            started_at,
            ended_at: Utc::now(),
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_milliseconds() as f64
    }

    /// Whether the stage completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, StageStatus::Completed)
    }
}

/// Complete record of a pipeline run.
///
/// Built exclusively by the orchestrator during a run; immutable once
/// returned to the caller. Stages appear in execution order and only
/// completed stages are listed; a failing stage is captured by [`Self::error`]
/// instead, so the caller knows exactly where to resume from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// The prompt the run started from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Requested style.
    pub style: ImageStyle,
    /// Requested output format.
    pub format: MeshFormat,
    /// Requested physical size.
    pub size_mm: f64,
    /// Completed stage results, in execution order.
    pub stages: Vec<StageResult>,
    /// Local path of the generated or supplied image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// Remote locator of the generated or supplied image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Local path of the generated or supplied mesh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_path: Option<PathBuf>,
    /// True only if the pricing stage succeeded.
    pub complete: bool,
    /// Terminal error when the run stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageFailure>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (complete or aborted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration of the run.
    #[serde(default)]
    pub duration_seconds: f64,
}

impl PipelineResult {
    /// Creates an empty result for a request.
    #[must_use]
    pub fn new(request: &PipelineRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            prompt: request.prompt.clone(),
            style: request.style,
            format: request.format,
            size_mm: request.size_mm,
            stages: Vec::new(),
            image_path: None,
            image_url: None,
            mesh_path: None,
            complete: false,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: 0.0,
        }
    }

    /// Appends a completed stage result.
    pub fn record(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    /// Records the terminal failure and stamps the end of the run.
    pub fn abort(&mut self, stage: PipelineStage, kind: ErrorKind, message: impl Into<String>) {
        self.error = Some(StageFailure {
            stage,
            kind,
            message: message.into(),
        });
        self.finish();
    }

    /// Stamps the end of the run.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_seconds = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.completed_at = Some(now);
    }

    /// Looks up the result for a stage, if it completed.
    #[must_use]
    pub fn stage(&self, stage: PipelineStage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Whether the run completed through pricing.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the run stopped early.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// The price sheet, when pricing completed.
    #[must_use]
    pub fn pricing(&self) -> Option<&PriceSheet> {
        match self.stage(PipelineStage::Pricing)?.payload.as_ref()? {
            StagePayload::Pricing(sheet) => Some(sheet),
            _ => None,
        }
    }

    /// The cheapest quoted material, when pricing completed.
    #[must_use]
    pub fn cheapest_material(&self) -> Option<&Material> {
        self.pricing()?.cheapest()
    }

    /// The validation report, when validation ran.
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationReport> {
        match self.stage(PipelineStage::MeshValidation)?.payload.as_ref()? {
            StagePayload::Validation(report) => Some(report),
            _ => None,
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the serialized result to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
