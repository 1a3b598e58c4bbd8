//! Printability validation for mesh files.
//!
//! Findings here are advisory: the pipeline records them and continues, and
//! the print service makes the final fabricability call.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::stl::{analyze_stl, Dimensions, MeshInfo, StlError};

/// Minimum plausible size of a binary STL file (header + count + nothing).
const MIN_STL_FILE_BYTES: u64 = 84;

/// Extensions we recognize as mesh files.
const KNOWN_EXTENSIONS: [&str; 5] = ["stl", "obj", "fbx", "glb", "gltf"];

/// Result of validating a mesh for 3D printing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no issues were found. Warnings do not affect this.
    pub is_valid: bool,
    /// Problems that would likely prevent a good print.
    pub issues: Vec<String>,
    /// Observations worth a look but not disqualifying.
    pub warnings: Vec<String>,
    /// Mesh statistics, when the file could be analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MeshInfo>,
}

impl ValidationReport {
    fn from_findings(issues: Vec<String>, warnings: Vec<String>, info: Option<MeshInfo>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
            warnings,
            info,
        }
    }
}

/// Validates a mesh file for 3D printing.
///
/// Never fails: unreadable or malformed files are reported through the
/// issues list so the caller can decide what to do with them.
#[must_use]
pub fn validate_mesh(path: &Path) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if !path.exists() {
        issues.push(format!("file not found: {}", path.display()));
        return ValidationReport::from_findings(issues, warnings, None);
    }

    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if file_size == 0 {
        issues.push("file is empty".to_string());
        return ValidationReport::from_findings(issues, warnings, None);
    }
    if file_size < MIN_STL_FILE_BYTES {
        issues.push("file too small to be valid STL".to_string());
        return ValidationReport::from_findings(issues, warnings, None);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !KNOWN_EXTENSIONS.contains(&extension.as_str()) {
        warnings.push(format!("unusual file extension: .{extension}"));
    }

    if extension != "stl" {
        // Full geometry analysis only covers STL.
        warnings.push(format!("limited validation for .{extension} format"));
        let info = MeshInfo {
            path: path.to_path_buf(),
            format: extension,
            triangle_count: 0,
            dimensions: None,
            estimated_volume_mm3: None,
            file_size_bytes: file_size,
            is_binary: true,
            boundary_edges: 0,
            non_manifold_edges: 0,
        };
        return ValidationReport::from_findings(issues, warnings, Some(info));
    }

    let info = match analyze_stl(path) {
        Ok(info) => info,
        Err(err) => {
            issues.push(format!("failed to parse STL: {err}"));
            return ValidationReport::from_findings(issues, warnings, None);
        }
    };

    if info.triangle_count == 0 {
        issues.push("mesh has no triangles".to_string());
    } else if info.triangle_count < 4 {
        warnings.push(format!("very low triangle count: {}", info.triangle_count));
    }

    if info.boundary_edges > 0 {
        issues.push(format!(
            "mesh is not watertight: {} boundary edges",
            info.boundary_edges
        ));
    }
    if info.non_manifold_edges > 0 {
        issues.push(format!(
            "mesh has {} non-manifold edges",
            info.non_manifold_edges
        ));
    }

    if let Some(dims) = info.dimensions {
        if dims.max_dimension() < 0.1 {
            warnings.push("model is very small (< 0.1 units)".to_string());
        }
        if dims.max_dimension() > 10_000.0 {
            warnings.push("model is very large (> 10000 units)".to_string());
        }
        if dims.width() < 0.001 || dims.depth() < 0.001 || dims.height() < 0.001 {
            warnings.push("model appears to be flat in one dimension".to_string());
        }
    }

    if let Some(volume) = info.estimated_volume_mm3 {
        if volume < 1.0 {
            warnings.push("estimated volume is very small".to_string());
        }
    }

    ValidationReport::from_findings(issues, warnings, Some(info))
}

/// Scaled dimensions when a mesh is printed at a target height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintSizeEstimate {
    /// Original bounding box, in file units.
    pub original: Dimensions,
    /// Scale factor applied to reach the target height.
    pub scale_factor: f64,
    /// Scaled width in millimeters.
    pub width_mm: f64,
    /// Scaled depth in millimeters.
    pub depth_mm: f64,
    /// Scaled height in millimeters.
    pub height_mm: f64,
    /// Scaled volume in cubic millimeters.
    pub estimated_volume_mm3: f64,
}

/// Estimates the printed size of a mesh scaled to a target height.
pub fn estimate_print_size(
    path: &Path,
    target_height_mm: f64,
) -> Result<PrintSizeEstimate, StlError> {
    let info = analyze_stl(path)?;
    let dims = info
        .dimensions
        .ok_or_else(|| StlError::Malformed("could not determine dimensions".to_string()))?;

    let scale = dims.scale_factor(target_height_mm);
    Ok(PrintSizeEstimate {
        original: dims,
        scale_factor: scale,
        width_mm: dims.width() * scale,
        depth_mm: dims.depth() * scale,
        height_mm: dims.height() * scale,
        estimated_volume_mm3: info.estimated_volume_mm3.unwrap_or(0.0) * scale.powi(3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{cube_stl_bytes, open_box_stl_bytes, write_fixture};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_cube_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "cube.stl", &cube_stl_bytes(20.0));

        let report = validate_mesh(&path);

        assert!(report.is_valid, "issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
        assert!(report.info.is_some());
    }

    #[test]
    fn test_open_mesh_flagged_not_watertight() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "open.stl", &open_box_stl_bytes(10.0));

        let report = validate_mesh(&path);

        assert!(!report.is_valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("not watertight")));
    }

    #[test]
    fn test_missing_file_reported_as_issue() {
        let report = validate_mesh(Path::new("/nonexistent/robot.stl"));
        assert!(!report.is_valid);
        assert!(report.issues[0].contains("file not found"));
        assert!(report.info.is_none());
    }

    #[test]
    fn test_tiny_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "tiny.stl", b"solid");

        let report = validate_mesh(&path);
        assert!(!report.is_valid);
        assert_eq!(report.issues, vec!["file too small to be valid STL"]);
    }

    #[test]
    fn test_non_stl_gets_limited_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "robot.glb", &[0u8; 200]);

        let report = validate_mesh(&path);

        assert!(report.is_valid);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("limited validation")));
        assert_eq!(report.info.unwrap().format, "glb");
    }

    #[test]
    fn test_estimate_print_size_scales_volume_cubically() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "cube.stl", &cube_stl_bytes(10.0));

        let estimate = estimate_print_size(&path, 50.0).unwrap();

        assert_eq!(estimate.scale_factor, 5.0);
        assert_eq!(estimate.height_mm, 50.0);
        assert_eq!(estimate.width_mm, 50.0);
        // 10^3 * 5^3
        assert!((estimate.estimated_volume_mm3 - 125_000.0).abs() < 50.0);
    }
}
