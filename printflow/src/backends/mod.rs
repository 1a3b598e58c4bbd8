//! Collaborator contracts consumed by the orchestrator.
//!
//! Each backend is a black box behind a narrow async trait: the orchestrator
//! sequences calls and wraps errors, it never implements provider logic.
//! HTTP implementations live behind the `http` feature; tests substitute the
//! mocks from [`crate::testing`].

mod artifacts;

#[cfg(feature = "http")]
mod image;
#[cfg(feature = "http")]
mod mesh;
#[cfg(feature = "http")]
mod print;

pub use artifacts::{ImageArtifact, Material, MeshArtifact, ModelUpload, PriceSheet};

#[cfg(feature = "http")]
pub use image::HttpImageBackend;
#[cfg(feature = "http")]
pub use mesh::{MeshyBackend, TaskStatus};
#[cfg(feature = "http")]
pub use print::ShapewaysBackend;

use async_trait::async_trait;
use std::path::Path;

use crate::errors::BackendError;
use crate::request::{ImageRef, ImageStyle, MeshFormat};

/// Provider-side progress callback for polling operations, in percent.
pub type PollProgress<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Generates a 2D image from a text prompt.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Generates an image for the given prompt and style.
    async fn generate(
        &self,
        prompt: &str,
        style: ImageStyle,
    ) -> Result<ImageArtifact, BackendError>;
}

/// Converts a 2D image into a 3D mesh.
///
/// Conversion is internally asynchronous on the provider side; the
/// implementation polls for completion bounded by its configured budget and
/// fails with the timeout variant of [`BackendError`] when it is exhausted.
#[async_trait]
pub trait MeshBackend: Send + Sync {
    /// Converts the referenced image into a mesh in the requested format.
    async fn from_image(
        &self,
        image: &ImageRef,
        target_size_mm: f64,
        format: MeshFormat,
        on_progress: Option<PollProgress<'_>>,
    ) -> Result<MeshArtifact, BackendError>;
}

/// Uploads meshes to a print service and quotes them.
#[async_trait]
pub trait PrintBackend: Send + Sync {
    /// Uploads a mesh file, returning the service-side model identifier.
    async fn upload(&self, mesh_path: &Path) -> Result<ModelUpload, BackendError>;

    /// Fetches material pricing for an uploaded model.
    async fn pricing(&self, model_id: &str) -> Result<PriceSheet, BackendError>;
}
