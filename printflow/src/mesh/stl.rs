//! STL file analysis.
//!
//! Reads binary and ASCII STL without external geometry dependencies:
//! triangle count, bounding box, a signed-tetrahedron volume estimate, and
//! edge-manifold statistics for the watertightness check.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised when an STL file cannot be read or parsed.
#[derive(Debug, Error)]
pub enum StlError {
    /// The file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file content is not valid STL.
    #[error("malformed stl: {0}")]
    Malformed(String),
}

/// Axis-aligned bounding box of a mesh, in file units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Minimum x.
    pub min_x: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum y.
    pub max_y: f64,
    /// Minimum z.
    pub min_z: f64,
    /// Maximum z.
    pub max_z: f64,
}

impl Dimensions {
    /// X extent.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Y extent.
    #[must_use]
    pub fn depth(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Z extent.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_z - self.min_z
    }

    /// Largest extent.
    #[must_use]
    pub fn max_dimension(&self) -> f64 {
        self.width().max(self.depth()).max(self.height())
    }

    /// Scale factor that brings the height to a target value.
    #[must_use]
    pub fn scale_factor(&self, target_height_mm: f64) -> f64 {
        let height = self.height();
        if height == 0.0 {
            1.0
        } else {
            target_height_mm / height
        }
    }
}

/// Basic information about a mesh file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshInfo {
    /// The analyzed file.
    pub path: PathBuf,
    /// File format tag (extension without the dot).
    pub format: String,
    /// Number of triangles.
    pub triangle_count: u32,
    /// Bounding box, when geometry was readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Rough enclosed volume in cubic file units, when geometry was readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_volume_mm3: Option<f64>,
    /// File size on disk.
    pub file_size_bytes: u64,
    /// Whether the file is binary STL.
    pub is_binary: bool,
    /// Edges bordering exactly one face. Zero for a watertight mesh.
    #[serde(default)]
    pub boundary_edges: u32,
    /// Edges bordering more than two faces.
    #[serde(default)]
    pub non_manifold_edges: u32,
}

impl MeshInfo {
    /// Upper bound on the vertex count.
    #[must_use]
    pub fn vertex_count_approx(&self) -> u32 {
        self.triangle_count.saturating_mul(3)
    }

    /// Whether every edge borders exactly two faces.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges == 0 && self.non_manifold_edges == 0
    }
}

type Vertex = [f32; 3];

/// Accumulates geometry statistics one triangle at a time.
struct MeshAccumulator {
    triangle_count: u32,
    min: [f64; 3],
    max: [f64; 3],
    signed_volume: f64,
    // Undirected edge -> incident face count, keyed on exact float bits.
    edges: HashMap<([u32; 3], [u32; 3]), u32>,
}

impl MeshAccumulator {
    fn new() -> Self {
        Self {
            triangle_count: 0,
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
            signed_volume: 0.0,
            edges: HashMap::new(),
        }
    }

    fn add_triangle(&mut self, v1: Vertex, v2: Vertex, v3: Vertex) {
        self.triangle_count += 1;

        for v in [v1, v2, v3] {
            for axis in 0..3 {
                let value = f64::from(v[axis]);
                self.min[axis] = self.min[axis].min(value);
                self.max[axis] = self.max[axis].max(value);
            }
        }

        self.signed_volume += signed_triangle_volume(v1, v2, v3);

        let k1 = vertex_key(v1);
        let k2 = vertex_key(v2);
        let k3 = vertex_key(v3);
        for (a, b) in [(k1, k2), (k2, k3), (k3, k1)] {
            let edge = if a <= b { (a, b) } else { (b, a) };
            *self.edges.entry(edge).or_insert(0) += 1;
        }
    }

    fn dimensions(&self) -> Option<Dimensions> {
        if self.triangle_count == 0 {
            return None;
        }
        Some(Dimensions {
            min_x: self.min[0],
            max_x: self.max[0],
            min_y: self.min[1],
            max_y: self.max[1],
            min_z: self.min[2],
            max_z: self.max[2],
        })
    }

    fn boundary_edges(&self) -> u32 {
        self.edges.values().filter(|&&count| count == 1).count() as u32
    }

    fn non_manifold_edges(&self) -> u32 {
        self.edges.values().filter(|&&count| count > 2).count() as u32
    }
}

fn vertex_key(v: Vertex) -> [u32; 3] {
    [v[0].to_bits(), v[1].to_bits(), v[2].to_bits()]
}

/// Signed volume of the tetrahedron formed by a triangle and the origin.
fn signed_triangle_volume(v1: Vertex, v2: Vertex, v3: Vertex) -> f64 {
    let [ax, ay, az] = v1.map(f64::from);
    let [bx, by, bz] = v2.map(f64::from);
    let [cx, cy, cz] = v3.map(f64::from);

    (ax * (by * cz - bz * cy) + ay * (bz * cx - bx * cz) + az * (bx * cy - by * cx)) / 6.0
}

/// Whether the content looks like binary STL.
///
/// Binary files occasionally begin with "solid" in the header, so the
/// ASCII verdict also requires a "facet normal" keyword near the start.
fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.starts_with(b"solid") {
        let head = &bytes[..bytes.len().min(1000)];
        let lowered = head.to_ascii_lowercase();
        if lowered
            .windows(b"facet normal".len())
            .any(|w| w == b"facet normal")
        {
            return false;
        }
    }
    true
}

fn read_binary(bytes: &[u8]) -> Result<MeshAccumulator, StlError> {
    // 80-byte header, then a little-endian u32 triangle count.
    if bytes.len() < 84 {
        return Err(StlError::Malformed(
            "could not read triangle count".to_string(),
        ));
    }
    let declared = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);

    let mut acc = MeshAccumulator::new();
    let mut offset = 84;
    for _ in 0..declared {
        // Normal (3 floats) + 3 vertices (9 floats) + attribute (2 bytes).
        if offset + 50 > bytes.len() {
            break;
        }
        let record = &bytes[offset..offset + 50];
        offset += 50;

        let mut floats = [0.0f32; 12];
        for (i, value) in floats.iter_mut().enumerate() {
            let start = i * 4;
            *value = f32::from_le_bytes([
                record[start],
                record[start + 1],
                record[start + 2],
                record[start + 3],
            ]);
        }

        // Skip the normal; only vertices matter.
        let v1 = [floats[3], floats[4], floats[5]];
        let v2 = [floats[6], floats[7], floats[8]];
        let v3 = [floats[9], floats[10], floats[11]];
        acc.add_triangle(v1, v2, v3);
    }

    Ok(acc)
}

fn read_ascii(text: &str) -> Result<MeshAccumulator, StlError> {
    let mut acc = MeshAccumulator::new();
    let mut pending: Vec<Vertex> = Vec::with_capacity(3);

    for line in text.lines() {
        let line = line.trim();
        if !line.to_ascii_lowercase().starts_with("vertex") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let coords: Result<Vec<f32>, _> = parts[1..4].iter().map(|p| p.parse::<f32>()).collect();
        let coords = coords
            .map_err(|err| StlError::Malformed(format!("bad vertex coordinate: {err}")))?;
        pending.push([coords[0], coords[1], coords[2]]);

        if pending.len() == 3 {
            acc.add_triangle(pending[0], pending[1], pending[2]);
            pending.clear();
        }
    }

    Ok(acc)
}

/// Analyzes an STL file.
pub fn analyze_stl(path: &Path) -> Result<MeshInfo, StlError> {
    let bytes = std::fs::read(path)?;
    let file_size_bytes = bytes.len() as u64;

    let is_binary = is_binary_stl(&bytes);
    let acc = if is_binary {
        read_binary(&bytes)?
    } else {
        read_ascii(&String::from_utf8_lossy(&bytes))?
    };

    Ok(MeshInfo {
        path: path.to_path_buf(),
        format: "stl".to_string(),
        triangle_count: acc.triangle_count,
        dimensions: acc.dimensions(),
        estimated_volume_mm3: if acc.triangle_count == 0 {
            None
        } else {
            Some(acc.signed_volume.abs())
        },
        file_size_bytes,
        is_binary,
        boundary_edges: acc.boundary_edges(),
        non_manifold_edges: acc.non_manifold_edges(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{
        ascii_pyramid_stl, cube_stl_bytes, open_box_stl_bytes, write_fixture,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_cube() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "cube.stl", &cube_stl_bytes(20.0));

        let info = analyze_stl(&path).unwrap();

        assert_eq!(info.triangle_count, 12);
        assert!(info.is_binary);
        assert!(info.is_watertight());

        let dims = info.dimensions.unwrap();
        assert_eq!(dims.width(), 20.0);
        assert_eq!(dims.depth(), 20.0);
        assert_eq!(dims.height(), 20.0);
        assert_eq!(dims.max_dimension(), 20.0);

        // A closed, consistently oriented cube encloses exactly s^3.
        let volume = info.estimated_volume_mm3.unwrap();
        assert!((volume - 8000.0).abs() < 1.0, "volume was {volume}");
    }

    #[test]
    fn test_open_box_has_boundary_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "open.stl", &open_box_stl_bytes(10.0));

        let info = analyze_stl(&path).unwrap();

        assert_eq!(info.triangle_count, 10);
        assert!(!info.is_watertight());
        assert_eq!(info.boundary_edges, 4);
        assert_eq!(info.non_manifold_edges, 0);
    }

    #[test]
    fn test_ascii_pyramid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "pyramid.stl", ascii_pyramid_stl().as_bytes());

        let info = analyze_stl(&path).unwrap();

        assert!(!info.is_binary);
        assert_eq!(info.triangle_count, 4);
        assert!(info.is_watertight());

        // Unit tetrahedron: volume 1/6.
        let volume = info.estimated_volume_mm3.unwrap();
        assert!((volume - 1.0 / 6.0).abs() < 1e-6, "volume was {volume}");
    }

    #[test]
    fn test_truncated_binary_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "short.stl", &[0u8; 40]);

        let err = analyze_stl(&path).unwrap_err();
        assert!(matches!(err, StlError::Malformed(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = analyze_stl(Path::new("/nonexistent/mesh.stl")).unwrap_err();
        assert!(matches!(err, StlError::Io(_)));
    }

    #[test]
    fn test_scale_factor() {
        let dims = Dimensions {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
            min_z: 0.0,
            max_z: 25.0,
        };
        assert_eq!(dims.scale_factor(50.0), 2.0);

        let flat = Dimensions {
            min_z: 5.0,
            max_z: 5.0,
            ..dims
        };
        assert_eq!(flat.scale_factor(50.0), 1.0);
    }

    #[test]
    fn test_vertex_count_approx() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "cube.stl", &cube_stl_bytes(5.0));
        let info = analyze_stl(&path).unwrap();
        assert_eq!(info.vertex_count_approx(), 36);
    }
}
