//! Artifact types produced by the backends.
//!
//! These are part of the serialized `PipelineResult` contract: field names
//! must remain stable since external tooling parses them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Result of image generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Image locator: a remote URL, a data URL, or a local path rendered
    /// as a string.
    pub url: String,
    /// Local copy, when the backend saved one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// The full prompt sent to the provider (after style templating).
    #[serde(default)]
    pub prompt: String,
    /// The caller-supplied subject before templating.
    #[serde(default)]
    pub original_prompt: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Provider-specific extras (backend name, model, raw ids).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ImageArtifact {
    /// Creates an artifact for a bare locator.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            local_path: None,
            prompt: String::new(),
            original_prompt: String::new(),
            width: 1024,
            height: 1024,
            metadata: HashMap::new(),
        }
    }

    /// Sets the local path.
    #[must_use]
    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }
}

/// Result of mesh conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshArtifact {
    /// Provider task identifier.
    pub task_id: String,
    /// Downloaded mesh file.
    pub local_path: PathBuf,
    /// Remote mesh URL, when the provider exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Triangle count reported by the provider, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polycount: Option<u64>,
    /// Provider-specific extras.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MeshArtifact {
    /// Creates an artifact for a downloaded mesh.
    #[must_use]
    pub fn new(task_id: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            local_path: local_path.into(),
            url: None,
            polycount: None,
            metadata: HashMap::new(),
        }
    }
}

/// Result of uploading a mesh to the print service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUpload {
    /// Service-side model identifier; all later calls key on this.
    pub model_id: String,
    /// Display filename.
    pub filename: String,
    /// File revision on the service.
    #[serde(default)]
    pub file_version: u32,
    /// Analyzed volume in cubic centimeters, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_cm3: Option<f64>,
    /// Analyzed surface area in square centimeters, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_area_cm2: Option<f64>,
    /// The service's own fabricability verdict.
    #[serde(default = "default_true")]
    pub is_printable: bool,
    /// Service-reported printability issues.
    #[serde(default)]
    pub printability_issues: Vec<String>,
    /// When the upload completed.
    pub uploaded_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl ModelUpload {
    /// Creates a minimal upload record.
    #[must_use]
    pub fn new(model_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            filename: filename.into(),
            file_version: 1,
            volume_cm3: None,
            surface_area_cm2: None,
            is_printable: true,
            printability_issues: Vec::new(),
            uploaded_at: Utc::now(),
        }
    }
}

/// An available print material with its quoted price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Service-side material identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Color description.
    #[serde(default)]
    pub color: String,
    /// Surface finish description.
    #[serde(default)]
    pub finish: String,
    /// Quoted price for this model.
    pub price: f64,
    /// Price currency.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Minimum printable wall thickness for this material.
    #[serde(default)]
    pub min_wall_thickness_mm: f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Material {
    /// Creates a material with a name and price.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: String::new(),
            finish: String::new(),
            price,
            currency: default_currency(),
            min_wall_thickness_mm: 0.0,
        }
    }
}

/// Pricing information for an uploaded model, sorted cheapest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSheet {
    /// The model these prices apply to.
    pub model_id: String,
    /// Available materials, ascending by price.
    pub materials: Vec<Material>,
}

impl PriceSheet {
    /// Creates a price sheet, sorting materials by ascending price.
    #[must_use]
    pub fn new(model_id: impl Into<String>, mut materials: Vec<Material>) -> Self {
        materials.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
        Self {
            model_id: model_id.into(),
            materials,
        }
    }

    /// The cheapest available material.
    #[must_use]
    pub fn cheapest(&self) -> Option<&Material> {
        self.materials.first()
    }

    /// Finds a material by name, case-insensitively.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Material> {
        self.materials
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Materials at or under a price limit.
    #[must_use]
    pub fn filter_by_price(&self, max_price: f64) -> Vec<&Material> {
        self.materials.iter().filter(|m| m.price <= max_price).collect()
    }
}
