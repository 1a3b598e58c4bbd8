//! Pipeline request types and boundary validation.
//!
//! Style and format tags are closed enums: unrecognized values are rejected
//! with a [`ValidationError`] at the boundary instead of being passed through
//! to a provider as loose strings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{ValidationError, MAX_SIZE_MM, MIN_SIZE_MM};
use crate::result::PipelineStage;

/// Predefined image styles optimized for image-to-3D conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    /// Collectible figurine with a solid base.
    Figurine,
    /// Isolated product-style object.
    Object,
    /// Full-body character in a neutral pose.
    Character,
    /// Classical sculpture rendering.
    Sculpture,
    /// Tabletop miniature at heroic proportions.
    Miniature,
    /// No template applied; the prompt is used verbatim.
    Custom,
}

impl ImageStyle {
    /// Stable string tag used in serialized output and provider calls.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Figurine => "figurine",
            Self::Object => "object",
            Self::Character => "character",
            Self::Sculpture => "sculpture",
            Self::Miniature => "miniature",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageStyle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "figurine" => Ok(Self::Figurine),
            "object" => Ok(Self::Object),
            "character" => Ok(Self::Character),
            "sculpture" => Ok(Self::Sculpture),
            "miniature" => Ok(Self::Miniature),
            "custom" => Ok(Self::Custom),
            other => Err(ValidationError::UnknownStyle(other.to_string())),
        }
    }
}

/// Output mesh file formats supported by the conversion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshFormat {
    /// Stereolithography, the print-service default.
    Stl,
    /// Wavefront OBJ.
    Obj,
    /// Autodesk FBX.
    Fbx,
    /// Binary glTF.
    Glb,
}

impl MeshFormat {
    /// Stable string tag, also the file extension.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::Fbx => "fbx",
            Self::Glb => "glb",
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MeshFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stl" => Ok(Self::Stl),
            "obj" => Ok(Self::Obj),
            "fbx" => Ok(Self::Fbx),
            "glb" => Ok(Self::Glb),
            other => Err(ValidationError::UnknownFormat(other.to_string())),
        }
    }
}

/// Reference to an existing image: a remote URL or a local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRef {
    /// A remote (or data) URL the mesh provider can fetch directly.
    Url(String),
    /// A local file that must be inlined before handing to a provider.
    Path(PathBuf),
}

impl ImageRef {
    /// The URL, when this reference is already remote.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Path(_) => None,
        }
    }

    /// The local path, when this reference points at a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Url(_) => None,
            Self::Path(path) => Some(path),
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::Url(s.to_string())
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// A single pipeline run request.
///
/// The starting artifact determines the entry stage. When more than one is
/// supplied, precedence is **mesh > image > prompt**: a prompt passed
/// alongside a mesh is ignored, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Subject description, when starting from text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Existing image to convert, when skipping generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Existing mesh file, when skipping generation and conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<PathBuf>,
    /// Image style tag.
    #[serde(default = "default_style")]
    pub style: ImageStyle,
    /// Output mesh format.
    #[serde(default = "default_format")]
    pub format: MeshFormat,
    /// Target physical height in millimeters, bounded [10, 500].
    #[serde(default = "default_size_mm")]
    pub size_mm: f64,
}

fn default_style() -> ImageStyle {
    ImageStyle::Figurine
}

fn default_format() -> MeshFormat {
    MeshFormat::Stl
}

fn default_size_mm() -> f64 {
    50.0
}

impl PipelineRequest {
    /// Creates a request starting from a text prompt.
    #[must_use]
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            image: None,
            mesh: None,
            style: default_style(),
            format: default_format(),
            size_mm: default_size_mm(),
        }
    }

    /// Creates a request starting from an existing image.
    #[must_use]
    pub fn from_image(image: impl Into<ImageRef>) -> Self {
        Self {
            prompt: None,
            image: Some(image.into()),
            mesh: None,
            style: ImageStyle::Custom,
            format: default_format(),
            size_mm: default_size_mm(),
        }
    }

    /// Creates a request starting from an existing mesh file.
    #[must_use]
    pub fn from_mesh(mesh: impl Into<PathBuf>) -> Self {
        Self {
            prompt: None,
            image: None,
            mesh: Some(mesh.into()),
            style: ImageStyle::Custom,
            format: default_format(),
            size_mm: default_size_mm(),
        }
    }

    /// Sets the style.
    #[must_use]
    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: MeshFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the target size.
    #[must_use]
    pub fn with_size_mm(mut self, size_mm: f64) -> Self {
        self.size_mm = size_mm;
        self
    }

    /// The stage this request enters the pipeline at.
    ///
    /// Precedence: mesh > image > prompt.
    #[must_use]
    pub fn entry_stage(&self) -> Option<PipelineStage> {
        if self.mesh.is_some() {
            Some(PipelineStage::MeshValidation)
        } else if self.image.is_some() {
            Some(PipelineStage::MeshConversion)
        } else if self.prompt.is_some() {
            Some(PipelineStage::ImageGeneration)
        } else {
            None
        }
    }

    /// Validates request parameters.
    ///
    /// Runs before any backend call; a failure here means no stage executed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_SIZE_MM..=MAX_SIZE_MM).contains(&self.size_mm) {
            return Err(ValidationError::size_out_of_range(self.size_mm));
        }
        if self.entry_stage().is_none() {
            return Err(ValidationError::MissingEntryArtifact);
        }
        Ok(())
    }
}
