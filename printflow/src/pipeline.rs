//! The pipeline orchestrator.
//!
//! Drives the linear stage sequence (image generation, mesh conversion,
//! mesh validation, print upload, pricing) against injected backend
//! implementations. The orchestrator owns sequencing, option translation,
//! error wrapping, and progress emission; it implements none of the
//! provider logic itself.
//!
//! Stages execute strictly sequentially: each stage's input is the previous
//! stage's output. A run may enter at image generation (prompt), mesh
//! conversion (existing image), or mesh validation (existing mesh); skipped
//! stages are absent from the result, not marked failed.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backends::{ImageBackend, MeshBackend, PrintBackend};
use crate::config::PipelineConfig;
use crate::errors::ValidationError;
use crate::mesh::validate_mesh;
use crate::progress::{emit, NoOpProgress, ProgressObserver};
use crate::request::{ImageRef, PipelineRequest};
use crate::result::{PipelineResult, PipelineStage, StagePayload, StageResult};

/// The prompt-to-quote pipeline.
///
/// Stateless between runs apart from read-only configuration and shared
/// backend handles; safe to reuse across concurrent runs, each of which
/// builds its own [`PipelineResult`].
pub struct Pipeline {
    config: PipelineConfig,
    image: Arc<dyn ImageBackend>,
    mesh: Arc<dyn MeshBackend>,
    print: Arc<dyn PrintBackend>,
}

impl Pipeline {
    /// Creates a pipeline with injected backends.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        image: Arc<dyn ImageBackend>,
        mesh: Arc<dyn MeshBackend>,
        print: Arc<dyn PrintBackend>,
    ) -> Self {
        Self {
            config,
            image,
            mesh,
            print,
        }
    }

    /// Creates a pipeline wired to the HTTP backends.
    #[cfg(feature = "http")]
    pub fn from_config(
        config: PipelineConfig,
    ) -> Result<Self, crate::errors::BackendError> {
        use crate::backends::{HttpImageBackend, MeshyBackend, ShapewaysBackend};

        let image = Arc::new(HttpImageBackend::new(&config)?);
        let mesh = Arc::new(MeshyBackend::new(&config)?);
        let print = Arc::new(ShapewaysBackend::new(&config)?);
        Ok(Self::new(config, image, mesh, print))
    }

    /// The pipeline's configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline without progress reporting.
    ///
    /// Returns `Err` only for request validation failures, which are
    /// rejected before any backend call. Stage failures are embedded in the
    /// returned result as its terminal error, preserving every stage result
    /// collected before the failure.
    pub async fn run(
        &self,
        request: &PipelineRequest,
    ) -> Result<PipelineResult, ValidationError> {
        self.run_with_progress(request, &NoOpProgress).await
    }

    /// Runs the pipeline, reporting progress before and after each stage.
    ///
    /// The observer is advisory: panics it raises are caught and logged.
    pub async fn run_with_progress(
        &self,
        request: &PipelineRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<PipelineResult, ValidationError> {
        request.validate()?;
        let Some(entry) = request.entry_stage() else {
            return Err(ValidationError::MissingEntryArtifact);
        };

        let mut result = PipelineResult::new(request);
        tracing::info!(run_id = %result.run_id, entry = %entry, "pipeline run started");

        let mut image_ref: Option<ImageRef> = None;
        let mut mesh_path: Option<PathBuf> = None;

        match entry {
            PipelineStage::ImageGeneration => {}
            PipelineStage::MeshConversion => {
                image_ref = request.image.clone();
            }
            _ => {
                mesh_path = request.mesh.clone();
                result.mesh_path = mesh_path.clone();
            }
        }

        // Stage 1: image generation. Without an image nothing downstream
        // is reachable, so failure aborts.
        if entry == PipelineStage::ImageGeneration {
            let stage = PipelineStage::ImageGeneration;
            let Some(prompt) = request.prompt.as_deref() else {
                return Err(ValidationError::MissingEntryArtifact);
            };
            emit(observer, stage, 0.1, "Generating 2D image...");
            let started = Utc::now();

            match self.image.generate(prompt, request.style).await {
                Ok(artifact) => {
                    result.image_url = Some(artifact.url.clone());
                    result.image_path = artifact.local_path.clone();
                    image_ref = Some(match &artifact.local_path {
                        Some(path) => ImageRef::Path(path.clone()),
                        None => ImageRef::Url(artifact.url.clone()),
                    });
                    result.record(StageResult::completed(
                        stage,
                        started,
                        StagePayload::Image(artifact),
                    ));
                    emit(observer, stage, 0.2, "Image generated");
                }
                Err(err) => {
                    tracing::error!(stage = %stage, %err, "stage failed");
                    emit(observer, stage, 0.0, &format!("Error: {err}"));
                    result.abort(stage, err.kind(), err.to_string());
                    self.persist(&result);
                    return Ok(result);
                }
            }
        }

        // Stage 2: mesh conversion. Provider polling progress is forwarded
        // as sub-fractions of this stage's window.
        if let Some(image) = image_ref {
            let stage = PipelineStage::MeshConversion;
            emit(observer, stage, 0.3, "Converting to 3D model...");
            let started = Utc::now();

            let forward = |percent: u8| {
                let fraction = 0.3 + (f64::from(percent) / 100.0) * 0.3;
                emit(observer, stage, fraction, &format!("3D conversion: {percent}%"));
            };

            let conversion = self
                .mesh
                .from_image(&image, request.size_mm, request.format, Some(&forward))
                .await;

            match conversion {
                Ok(artifact) => {
                    result.mesh_path = Some(artifact.local_path.clone());
                    mesh_path = Some(artifact.local_path.clone());
                    result.record(StageResult::completed(
                        stage,
                        started,
                        StagePayload::Mesh(artifact),
                    ));
                    emit(observer, stage, 0.6, "3D model generated");
                }
                Err(err) => {
                    tracing::error!(stage = %stage, %err, "stage failed");
                    emit(observer, stage, 0.0, &format!("Error: {err}"));
                    result.abort(stage, err.kind(), err.to_string());
                    self.persist(&result);
                    return Ok(result);
                }
            }
        }

        let Some(mesh_path) = mesh_path else {
            // Unreachable through the public entry points; validated above.
            return Err(ValidationError::MissingEntryArtifact);
        };

        // Stage 3: local validation. Findings are advisory, so the run
        // continues with the issues recorded as data; the print service is
        // the authority on fabricability.
        {
            let stage = PipelineStage::MeshValidation;
            emit(observer, stage, 0.65, "Validating mesh...");
            let started = Utc::now();

            let report = validate_mesh(&mesh_path);
            if report.is_valid {
                emit(observer, stage, 0.7, "Mesh validated");
            } else {
                tracing::warn!(issues = ?report.issues, "mesh validation found issues");
                emit(
                    observer,
                    stage,
                    0.7,
                    &format!("Validation issues present: {}", report.issues.join("; ")),
                );
            }
            result.record(StageResult::completed(
                stage,
                started,
                StagePayload::Validation(report),
            ));
        }

        // Stage 4: upload. No pricing is possible without a model id, so
        // failure aborts.
        let model_id = {
            let stage = PipelineStage::PrintUpload;
            emit(observer, stage, 0.75, "Uploading to print service...");
            let started = Utc::now();

            match self.print.upload(&mesh_path).await {
                Ok(upload) => {
                    let model_id = upload.model_id.clone();
                    result.record(StageResult::completed(
                        stage,
                        started,
                        StagePayload::Upload(upload),
                    ));
                    emit(observer, stage, 0.85, "Model uploaded");
                    model_id
                }
                Err(err) => {
                    tracing::error!(stage = %stage, %err, "stage failed");
                    emit(observer, stage, 0.0, &format!("Error: {err}"));
                    result.abort(stage, err.kind(), err.to_string());
                    self.persist(&result);
                    return Ok(result);
                }
            }
        };

        // Stage 5: pricing. Failure aborts but the caller keeps the image,
        // mesh, and upload id collected so far.
        {
            let stage = PipelineStage::Pricing;
            emit(observer, stage, 0.9, "Getting pricing...");
            let started = Utc::now();

            match self.print.pricing(&model_id).await {
                Ok(sheet) => {
                    let count = sheet.materials.len();
                    result.record(StageResult::completed(
                        stage,
                        started,
                        StagePayload::Pricing(sheet),
                    ));
                    emit(
                        observer,
                        stage,
                        0.95,
                        &format!("Pricing received: {count} materials"),
                    );
                }
                Err(err) => {
                    tracing::error!(stage = %stage, %err, "stage failed");
                    emit(observer, stage, 0.0, &format!("Error: {err}"));
                    result.abort(stage, err.kind(), err.to_string());
                    self.persist(&result);
                    return Ok(result);
                }
            }
        }

        result.complete = true;
        result.finish();
        emit(observer, PipelineStage::Pricing, 1.0, "Pipeline complete");
        tracing::info!(
            run_id = %result.run_id,
            duration_seconds = result.duration_seconds,
            "pipeline run complete"
        );
        self.persist(&result);

        Ok(result)
    }

    /// Runs the pipeline starting from an existing image, skipping
    /// generation.
    pub async fn run_from_image(
        &self,
        image: impl Into<ImageRef> + Send,
        size_mm: f64,
    ) -> Result<PipelineResult, ValidationError> {
        let request = PipelineRequest::from_image(image)
            .with_size_mm(size_mm)
            .with_format(self.config.default_mesh_format);
        self.run(&request).await
    }

    /// Runs the pipeline starting from an existing mesh: validation,
    /// upload, and pricing only.
    pub async fn run_from_mesh(
        &self,
        mesh: impl Into<PathBuf> + Send,
    ) -> Result<PipelineResult, ValidationError> {
        let request = PipelineRequest::from_mesh(mesh)
            .with_size_mm(self.config.default_size_mm)
            .with_format(self.config.default_mesh_format);
        self.run(&request).await
    }

    /// Best-effort persistence of the run record.
    ///
    /// A failure here is logged and reported separately; it never
    /// substitutes for the pipeline's own success or failure status.
    fn persist(&self, result: &PipelineResult) {
        let path = self
            .config
            .output_dir
            .join(format!("run_{}.json", result.run_id));
        if let Err(err) = result.save(&path) {
            tracing::warn!(%err, path = %path.display(), "could not persist pipeline result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::mocks::{MockImageBackend, MockMeshBackend, MockPrintBackend};

    fn pipeline_with(
        image: MockImageBackend,
        mesh: MockMeshBackend,
        print: MockPrintBackend,
        output_dir: &std::path::Path,
    ) -> Pipeline {
        Pipeline::new(
            PipelineConfig::default().with_output_dir(output_dir),
            Arc::new(image),
            Arc::new(mesh),
            Arc::new(print),
        )
    }

    #[tokio::test]
    async fn test_validation_error_before_any_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let image = MockImageBackend::succeeding(dir.path());
        let mesh = MockMeshBackend::succeeding(dir.path());
        let print = MockPrintBackend::succeeding();
        let pipeline = pipeline_with(image, mesh, print, dir.path());

        let request = PipelineRequest::from_prompt("x").with_size_mm(600.0);
        let err = pipeline.run(&request).await.unwrap_err();

        assert!(matches!(err, ValidationError::SizeOutOfRange { .. }));
    }

    #[tokio::test]
    async fn test_persist_writes_run_record() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            MockImageBackend::succeeding(dir.path()),
            MockMeshBackend::succeeding(dir.path()),
            MockPrintBackend::succeeding(),
            dir.path(),
        );

        let request = PipelineRequest::from_prompt("a cute robot");
        let result = pipeline.run(&request).await.unwrap();
        assert!(result.is_complete());

        let record = dir.path().join(format!("run_{}.json", result.run_id));
        assert!(record.exists());
    }

    #[tokio::test]
    async fn test_pricing_failure_preserves_prior_stages() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(
            MockImageBackend::succeeding(dir.path()),
            MockMeshBackend::succeeding(dir.path()),
            MockPrintBackend::failing_pricing("quota exhausted"),
            dir.path(),
        );

        let request = PipelineRequest::from_prompt("a cute robot");
        let result = pipeline.run(&request).await.unwrap();

        assert!(!result.is_complete());
        let failure = result.error.as_ref().unwrap();
        assert_eq!(failure.stage, PipelineStage::Pricing);
        assert_eq!(failure.kind, ErrorKind::Backend);
        // Image, mesh, validation, and upload all survive.
        assert_eq!(result.stages.len(), 4);
        assert!(result.stage(PipelineStage::PrintUpload).is_some());
    }
}
