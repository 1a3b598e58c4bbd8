//! # Printflow
//!
//! A prompt-to-print pipeline orchestrator: text prompt → 2D image →
//! 3D mesh → print quote.
//!
//! Printflow chains third-party services into one linear, partially
//! skippable pipeline with:
//!
//! - **Staged execution**: image generation, mesh conversion, mesh
//!   validation, print upload, pricing, strictly in order
//! - **Partial entry points**: start from a prompt, an existing image, or
//!   an existing mesh
//! - **Progress reporting**: an injected observer notified before and after
//!   each stage, isolated from the run
//! - **Partial-failure recovery**: every completed stage survives on the
//!   returned result, and the terminal error names the failing stage so
//!   callers can resume from the last good artifact
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use printflow::prelude::*;
//!
//! let config = PipelineConfig::from_env()?;
//! let pipeline = Pipeline::from_config(config)?;
//!
//! let request = PipelineRequest::from_prompt("a cute robot")
//!     .with_style(ImageStyle::Figurine)
//!     .with_size_mm(50.0);
//!
//! let result = pipeline.run(&request).await?;
//! println!("model: {:?}", result.mesh_path);
//! println!("cheapest: {:?}", result.cheapest_material());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backends;
pub mod config;
pub mod errors;
pub mod mesh;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod request;
pub mod result;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backends::{
        ImageArtifact, ImageBackend, Material, MeshArtifact, MeshBackend, ModelUpload,
        PriceSheet, PrintBackend,
    };
    pub use crate::config::PipelineConfig;
    pub use crate::errors::{
        BackendError, ErrorKind, PersistenceError, StageFailure, ValidationError,
    };
    pub use crate::mesh::{validate_mesh, ValidationReport};
    pub use crate::pipeline::Pipeline;
    pub use crate::progress::{
        CollectingProgress, LoggingProgress, NoOpProgress, ProgressObserver,
    };
    pub use crate::request::{ImageRef, ImageStyle, MeshFormat, PipelineRequest};
    pub use crate::result::{
        PipelineResult, PipelineStage, StagePayload, StageResult, StageStatus,
    };

    #[cfg(feature = "http")]
    pub use crate::backends::{HttpImageBackend, MeshyBackend, ShapewaysBackend};
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
