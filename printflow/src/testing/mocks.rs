//! Mock backends for testing the orchestrator.
//!
//! Each mock records its call count and can be scripted to succeed, fail
//! with a provider error, or exhaust its wait budget.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use super::fixtures::cube_stl_bytes;
use crate::backends::{
    ImageArtifact, ImageBackend, Material, MeshArtifact, MeshBackend, ModelUpload,
    PollProgress, PriceSheet, PrintBackend,
};
use crate::errors::BackendError;
use crate::progress::ProgressObserver;
use crate::request::{ImageRef, ImageStyle, MeshFormat};
use crate::result::PipelineStage;

/// How a scripted mock responds.
#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    TimeOut(u64),
}

impl Behavior {
    fn error(&self, operation: &str) -> Option<BackendError> {
        match self {
            Self::Succeed => None,
            Self::Fail(message) => Some(BackendError::api(Some(500), message.clone())),
            Self::TimeOut(budget) => Some(BackendError::timeout(operation, *budget)),
        }
    }
}

/// A scriptable image backend.
#[derive(Debug)]
pub struct MockImageBackend {
    behavior: Behavior,
    output_dir: PathBuf,
    calls: Mutex<usize>,
}

impl MockImageBackend {
    /// A backend that writes a placeholder image and succeeds.
    #[must_use]
    pub fn succeeding(output_dir: &Path) -> Self {
        Self {
            behavior: Behavior::Succeed,
            output_dir: output_dir.to_path_buf(),
            calls: Mutex::new(0),
        }
    }

    /// A backend that always fails with a provider error.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            output_dir: PathBuf::new(),
            calls: Mutex::new(0),
        }
    }

    /// A backend that always exhausts its wait budget.
    #[must_use]
    pub fn timing_out(budget_seconds: u64) -> Self {
        Self {
            behavior: Behavior::TimeOut(budget_seconds),
            output_dir: PathBuf::new(),
            calls: Mutex::new(0),
        }
    }

    /// Number of `generate` calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn generate(
        &self,
        prompt: &str,
        style: ImageStyle,
    ) -> Result<ImageArtifact, BackendError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };

        if let Some(err) = self.behavior.error("image generation") {
            return Err(err);
        }

        let path = self.output_dir.join(format!("mock_image_{call}.png"));
        std::fs::write(&path, b"png-bytes")?;

        let mut artifact = ImageArtifact::new(path.display().to_string()).with_local_path(&path);
        artifact.original_prompt = prompt.to_string();
        artifact.prompt = prompt.to_string();
        artifact
            .metadata
            .insert("style".to_string(), serde_json::json!(style.as_str()));
        Ok(artifact)
    }
}

/// A scriptable mesh backend.
///
/// On success it writes real STL bytes, so the validation stage downstream
/// sees an analyzable mesh.
#[derive(Debug)]
pub struct MockMeshBackend {
    behavior: Behavior,
    output_dir: PathBuf,
    mesh_bytes: Vec<u8>,
    calls: Mutex<usize>,
    received_sizes: Mutex<Vec<f64>>,
}

impl MockMeshBackend {
    /// A backend producing a watertight cube mesh.
    #[must_use]
    pub fn succeeding(output_dir: &Path) -> Self {
        Self::succeeding_with_mesh(output_dir, cube_stl_bytes(20.0))
    }

    /// A backend producing the given mesh bytes.
    #[must_use]
    pub fn succeeding_with_mesh(output_dir: &Path, mesh_bytes: Vec<u8>) -> Self {
        Self {
            behavior: Behavior::Succeed,
            output_dir: output_dir.to_path_buf(),
            mesh_bytes,
            calls: Mutex::new(0),
            received_sizes: Mutex::new(Vec::new()),
        }
    }

    /// A backend that always fails with a provider error.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Fail(message.into()),
            output_dir: PathBuf::new(),
            mesh_bytes: Vec::new(),
            calls: Mutex::new(0),
            received_sizes: Mutex::new(Vec::new()),
        }
    }

    /// A backend that always exhausts its wait budget.
    #[must_use]
    pub fn timing_out(budget_seconds: u64) -> Self {
        Self {
            behavior: Behavior::TimeOut(budget_seconds),
            output_dir: PathBuf::new(),
            mesh_bytes: Vec::new(),
            calls: Mutex::new(0),
            received_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Number of `from_image` calls received.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    /// The `target_size_mm` values received, in call order.
    #[must_use]
    pub fn received_sizes(&self) -> Vec<f64> {
        self.received_sizes.lock().clone()
    }
}

#[async_trait]
impl MeshBackend for MockMeshBackend {
    async fn from_image(
        &self,
        _image: &ImageRef,
        target_size_mm: f64,
        format: MeshFormat,
        on_progress: Option<PollProgress<'_>>,
    ) -> Result<MeshArtifact, BackendError> {
        let call = {
            let mut calls = self.calls.lock();
            *calls += 1;
            *calls
        };
        self.received_sizes.lock().push(target_size_mm);

        if let Some(err) = self.behavior.error("mesh conversion") {
            return Err(err);
        }

        if let Some(report) = on_progress {
            report(50);
            report(100);
        }

        let path = self.output_dir.join(format!("mock_mesh_{call}.{format}"));
        std::fs::write(&path, &self.mesh_bytes)?;

        let mut artifact = MeshArtifact::new(format!("task-{call}"), path);
        artifact.polycount = Some(12);
        Ok(artifact)
    }
}

/// A scriptable print backend.
#[derive(Debug)]
pub struct MockPrintBackend {
    upload_behavior: Behavior,
    pricing_behavior: Behavior,
    upload_calls: Mutex<usize>,
    pricing_calls: Mutex<usize>,
}

impl MockPrintBackend {
    /// A backend where upload and pricing both succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            upload_behavior: Behavior::Succeed,
            pricing_behavior: Behavior::Succeed,
            upload_calls: Mutex::new(0),
            pricing_calls: Mutex::new(0),
        }
    }

    /// A backend whose upload always fails.
    #[must_use]
    pub fn failing_upload(message: impl Into<String>) -> Self {
        Self {
            upload_behavior: Behavior::Fail(message.into()),
            ..Self::succeeding()
        }
    }

    /// A backend whose pricing always fails.
    #[must_use]
    pub fn failing_pricing(message: impl Into<String>) -> Self {
        Self {
            pricing_behavior: Behavior::Fail(message.into()),
            ..Self::succeeding()
        }
    }

    /// Number of `upload` calls received.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        *self.upload_calls.lock()
    }

    /// Number of `pricing` calls received.
    #[must_use]
    pub fn pricing_calls(&self) -> usize {
        *self.pricing_calls.lock()
    }
}

#[async_trait]
impl PrintBackend for MockPrintBackend {
    async fn upload(&self, mesh_path: &Path) -> Result<ModelUpload, BackendError> {
        let call = {
            let mut calls = self.upload_calls.lock();
            *calls += 1;
            *calls
        };

        if let Some(err) = self.upload_behavior.error("model upload") {
            return Err(err);
        }

        let filename = mesh_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.stl")
            .to_string();
        Ok(ModelUpload::new(format!("model-{call}"), filename))
    }

    async fn pricing(&self, model_id: &str) -> Result<PriceSheet, BackendError> {
        *self.pricing_calls.lock() += 1;

        if let Some(err) = self.pricing_behavior.error("pricing") {
            return Err(err);
        }

        Ok(PriceSheet::new(
            model_id,
            vec![
                Material::new("m1", "White Plastic", 12.5),
                Material::new("m2", "Steel", 42.0),
            ],
        ))
    }
}

/// An observer that panics on every notification.
///
/// Exists to prove that observer failures cannot destabilize a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingObserver;

impl ProgressObserver for PanickingObserver {
    fn on_progress(&self, _stage: PipelineStage, _fraction: f64, _message: &str) {
        panic!("observer misbehaved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_mock_image_backend_counts_calls() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockImageBackend::succeeding(dir.path());

        let artifact = backend
            .generate("a cute robot", ImageStyle::Figurine)
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert!(artifact.local_path.unwrap().exists());
    }

    #[tokio::test]
    async fn test_mock_mesh_backend_reports_progress_and_writes_stl() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockMeshBackend::succeeding(dir.path());

        let seen = Mutex::new(Vec::new());
        let report = |p: u8| seen.lock().push(p);

        let artifact = backend
            .from_image(
                &ImageRef::from("https://example.com/a.png"),
                50.0,
                MeshFormat::Stl,
                Some(&report),
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![50, 100]);
        assert_eq!(backend.received_sizes(), vec![50.0]);
        assert!(artifact.local_path.exists());
    }

    #[tokio::test]
    async fn test_mock_print_backend_failure_modes() {
        let backend = MockPrintBackend::failing_upload("rejected");
        let err = backend.upload(Path::new("model.stl")).await.unwrap_err();
        assert!(matches!(err, BackendError::Api { .. }));
        assert_eq!(backend.upload_calls(), 1);

        let backend = MockPrintBackend::succeeding();
        let sheet = backend.pricing("model-1").await.unwrap();
        assert_eq!(sheet.cheapest().unwrap().name, "White Plastic");
    }

    #[tokio::test]
    async fn test_timing_out_backend_yields_timeout_kind() {
        let backend = MockImageBackend::timing_out(120);
        let err = backend
            .generate("x", ImageStyle::Custom)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
