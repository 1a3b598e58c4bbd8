//! Benchmarks for the STL reader and mesh validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use printflow::mesh::{analyze_stl, validate_mesh};
use printflow::testing::fixtures::{binary_stl, cube_triangles, write_fixture};

/// A grid of translated cubes, `count * 12` triangles.
fn cube_grid_stl(count: usize) -> Vec<u8> {
    let base = cube_triangles(1.0);
    let mut triangles = Vec::with_capacity(count * base.len());
    for i in 0..count {
        let offset = (i as f32) * 2.0;
        for triangle in &base {
            triangles.push(triangle.map(|v| [v[0] + offset, v[1], v[2]]));
        }
    }
    binary_stl(&triangles)
}

fn stl_benchmark(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("bench dir");
    let small = write_fixture(dir.path(), "small.stl", &cube_grid_stl(1));
    let large = write_fixture(dir.path(), "large.stl", &cube_grid_stl(1000));

    c.bench_function("analyze_stl/12_triangles", |b| {
        b.iter(|| analyze_stl(black_box(&small)))
    });

    c.bench_function("analyze_stl/12000_triangles", |b| {
        b.iter(|| analyze_stl(black_box(&large)))
    });

    c.bench_function("validate_mesh/12000_triangles", |b| {
        b.iter(|| validate_mesh(black_box(&large)))
    });
}

criterion_group!(benches, stl_benchmark);
criterion_main!(benches);
