//! STL fixtures for tests and benchmarks.

use std::path::{Path, PathBuf};

type Triangle = [[f32; 3]; 3];

/// Encodes triangles as a binary STL byte stream.
#[must_use]
pub fn binary_stl(triangles: &[Triangle]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(84 + triangles.len() * 50);
    bytes.extend_from_slice(&[0u8; 80]);
    bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());

    for triangle in triangles {
        // Normal is left zeroed; readers recompute or ignore it.
        for _ in 0..3 {
            bytes.extend_from_slice(&0.0f32.to_le_bytes());
        }
        for vertex in triangle {
            for coord in vertex {
                bytes.extend_from_slice(&coord.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }

    bytes
}

/// The twelve consistently outward-oriented triangles of an axis-aligned
/// cube spanning `[0, size]` on each axis.
#[must_use]
pub fn cube_triangles(size: f32) -> Vec<Triangle> {
    let s = size;
    let v = [
        [0.0, 0.0, 0.0],
        [s, 0.0, 0.0],
        [s, s, 0.0],
        [0.0, s, 0.0],
        [0.0, 0.0, s],
        [s, 0.0, s],
        [s, s, s],
        [0.0, s, s],
    ];

    vec![
        // bottom (z = 0)
        [v[0], v[2], v[1]],
        [v[0], v[3], v[2]],
        // top (z = s)
        [v[4], v[5], v[6]],
        [v[4], v[6], v[7]],
        // front (y = 0)
        [v[0], v[1], v[5]],
        [v[0], v[5], v[4]],
        // back (y = s)
        [v[2], v[3], v[7]],
        [v[2], v[7], v[6]],
        // left (x = 0)
        [v[0], v[4], v[7]],
        [v[0], v[7], v[3]],
        // right (x = s)
        [v[1], v[2], v[6]],
        [v[1], v[6], v[5]],
    ]
}

/// A watertight cube as binary STL.
#[must_use]
pub fn cube_stl_bytes(size: f32) -> Vec<u8> {
    binary_stl(&cube_triangles(size))
}

/// A cube with its top face removed: ten triangles, four boundary edges.
#[must_use]
pub fn open_box_stl_bytes(size: f32) -> Vec<u8> {
    let mut triangles = cube_triangles(size);
    // Triangles 2 and 3 are the top face.
    triangles.remove(3);
    triangles.remove(2);
    binary_stl(&triangles)
}

/// A unit tetrahedron as ASCII STL.
#[must_use]
pub fn ascii_pyramid_stl() -> String {
    let triangles: [Triangle; 4] = [
        // base (z = 0), facing down
        [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        // sides, facing out
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
        [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]],
    ];

    let mut out = String::from("solid pyramid\n");
    for triangle in &triangles {
        out.push_str("  facet normal 0 0 0\n    outer loop\n");
        for vertex in triangle {
            out.push_str(&format!(
                "      vertex {} {} {}\n",
                vertex[0], vertex[1], vertex[2]
            ));
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    out.push_str("endsolid pyramid\n");
    out
}

/// Writes fixture bytes under a directory and returns the path.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("fixture dir");
    }
    std::fs::write(&path, bytes).expect("fixture write");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_stl_layout() {
        let bytes = cube_stl_bytes(1.0);
        assert_eq!(bytes.len(), 84 + 12 * 50);
        assert_eq!(
            u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]),
            12
        );
    }

    #[test]
    fn test_open_box_has_ten_triangles() {
        let bytes = open_box_stl_bytes(1.0);
        assert_eq!(
            u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]),
            10
        );
    }

    #[test]
    fn test_ascii_pyramid_is_ascii_stl() {
        let text = ascii_pyramid_stl();
        assert!(text.starts_with("solid"));
        assert!(text.contains("facet normal"));
        assert_eq!(text.matches("vertex").count(), 12);
    }
}
