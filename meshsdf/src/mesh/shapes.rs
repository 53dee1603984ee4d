//! Closed, consistently wound primitive meshes
//!
//! These are used for testing, benchmarking, and as demo inputs.
use super::Mesh;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Builds an axis-aligned cube with side length `size`, centered at the origin
///
/// The cube has 8 shared vertices and 12 triangles.
pub fn cube(size: f32) -> Mesh {
    let h = size / 2.0;
    // Vertex `i` has its X, Y, Z coordinate set by bits 0, 1, 2 of `i`
    let vertices = (0..8)
        .map(|i| {
            let c = |bit: usize| if i & (1 << bit) != 0 { h } else { -h };
            Vector3::new(c(0), c(1), c(2))
        })
        .collect();

    const QUADS: [[usize; 4]; 6] = [
        [0, 4, 6, 2], // -X
        [1, 3, 7, 5], // +X
        [0, 1, 5, 4], // -Y
        [2, 6, 7, 3], // +Y
        [0, 2, 3, 1], // -Z
        [4, 5, 7, 6], // +Z
    ];
    let triangles = QUADS
        .iter()
        .flat_map(|&[a, b, c, d]| {
            [Vector3::new(a, b, c), Vector3::new(a, c, d)]
        })
        .collect();

    Mesh {
        triangles,
        vertices,
    }
}

/// Builds a sphere of the given radius by subdividing an icosahedron
///
/// Each subdivision splits every triangle into four, so the mesh has
/// `20 * 4^subdivisions` triangles.  All vertices lie exactly on the sphere.
pub fn icosphere(radius: f32, subdivisions: usize) -> Mesh {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let mut vertices: Vec<Vector3<f32>> = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ]
    .iter()
    .map(|v| Vector3::from(*v).normalize())
    .collect();

    let mut triangles: Vec<Vector3<usize>> = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ]
    .iter()
    .map(|t| Vector3::from(*t))
    .collect();

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize| {
            *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                let m = (vertices[a] + vertices[b]).normalize();
                vertices.push(m);
                vertices.len() - 1
            })
        };
        triangles = triangles
            .iter()
            .flat_map(|t| {
                let (a, b, c) = (t.x, t.y, t.z);
                let ab = midpoint(a, b);
                let bc = midpoint(b, c);
                let ca = midpoint(c, a);
                [
                    Vector3::new(a, ab, ca),
                    Vector3::new(b, bc, ab),
                    Vector3::new(c, ca, bc),
                    Vector3::new(ab, bc, ca),
                ]
            })
            .collect();
    }

    for v in &mut vertices {
        *v *= radius;
    }
    Mesh {
        triangles,
        vertices,
    }
}
