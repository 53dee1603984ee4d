//! Mesh connectivity: angle-weighted pseudonormals and manifold checks
use super::Triangle;
use crate::{error::Warning, types::Feature};
use nalgebra::Vector3;
use std::collections::HashMap;

/// Pseudonormals for the edges and vertices of a single triangle
///
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % 3`.
#[derive(Copy, Clone, Debug)]
pub struct Pseudonormals {
    /// Normalized sum of the face normals of the triangles sharing each edge
    pub edges: [Vector3<f32>; 3],
    /// Angle-weighted sum of the face normals around each vertex
    pub verts: [Vector3<f32>; 3],
}

impl Pseudonormals {
    /// Picks the normal used for sign determination at the given feature
    #[inline]
    pub fn get(&self, face: Vector3<f32>, feature: Feature) -> Vector3<f32> {
        match feature {
            Feature::Face => face,
            Feature::Edge(i) => self.edges[i as usize],
            Feature::Vertex(i) => self.verts[i as usize],
        }
    }
}

/// Counts of edges which break the closed-manifold assumption
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TopologyReport {
    /// Edges with exactly one adjacent triangle
    pub boundary_edges: usize,
    /// Edges with more than two adjacent triangles
    pub nonmanifold_edges: usize,
    /// Edges whose two triangles traverse it in the same direction
    pub misoriented_edges: usize,
}

impl TopologyReport {
    /// Checks whether the mesh is a closed, consistently wound manifold
    pub fn is_closed_manifold(&self) -> bool {
        self.boundary_edges == 0
            && self.nonmanifold_edges == 0
            && self.misoriented_edges == 0
    }

    /// Converts the report into a warning, if anything is wrong
    pub fn warning(&self) -> Option<Warning> {
        if self.is_closed_manifold() {
            None
        } else {
            Some(Warning::NonManifold {
                boundary_edges: self.boundary_edges,
                nonmanifold_edges: self.nonmanifold_edges,
                misoriented_edges: self.misoriented_edges,
            })
        }
    }
}

#[derive(Default)]
struct EdgeRecord {
    normal: Vector3<f32>,
    count: usize,
    /// Number of triangles traversing the edge from low to high index
    forward: usize,
}

/// Builds per-triangle pseudonormals from shared-vertex connectivity
///
/// `indices[i]` holds the welded vertex indices of `triangles[i]`.
pub(crate) fn build(
    indices: &[[u32; 3]],
    triangles: &[Triangle],
    vertex_count: usize,
) -> (Vec<Pseudonormals>, TopologyReport) {
    debug_assert_eq!(indices.len(), triangles.len());

    let mut vert_normals = vec![Vector3::zeros(); vertex_count];
    let mut edges: HashMap<(u32, u32), EdgeRecord> = HashMap::new();

    for (tri, idx) in triangles.iter().zip(indices) {
        let n = tri.normal();
        for i in 0..3 {
            vert_normals[idx[i] as usize] += n * tri.angle(i);

            let (a, b) = (idx[i], idx[(i + 1) % 3]);
            let e = edges.entry((a.min(b), a.max(b))).or_default();
            e.normal += n;
            e.count += 1;
            e.forward += usize::from(a < b);
        }
    }

    let mut report = TopologyReport::default();
    for e in edges.values() {
        match e.count {
            1 => report.boundary_edges += 1,
            2 if e.forward != 1 => report.misoriented_edges += 1,
            2 => (),
            _ => report.nonmanifold_edges += 1,
        }
    }

    let normalize =
        |v: Vector3<f32>| v.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
    let out = indices
        .iter()
        .map(|idx| {
            let edge = |i: usize| {
                let (a, b) = (idx[i], idx[(i + 1) % 3]);
                normalize(edges[&(a.min(b), a.max(b))].normal)
            };
            Pseudonormals {
                edges: [edge(0), edge(1), edge(2)],
                verts: idx.map(|v| normalize(vert_normals[v as usize])),
            }
        })
        .collect();

    (out, report)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point3;

    /// Unit tetrahedron with outward-facing triangles
    fn tetrahedron() -> (Vec<Point3<f32>>, Vec<[u32; 3]>) {
        let verts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let tris = vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        (verts, tris)
    }

    fn triangles(verts: &[Point3<f32>], tris: &[[u32; 3]]) -> Vec<Triangle> {
        tris.iter()
            .map(|t| {
                Triangle::new(
                    verts[t[0] as usize],
                    verts[t[1] as usize],
                    verts[t[2] as usize],
                )
            })
            .collect()
    }

    #[test]
    fn closed_tetrahedron() {
        let (verts, tris) = tetrahedron();
        let (normals, report) =
            build(&tris, &triangles(&verts, &tris), verts.len());
        assert!(report.is_closed_manifold());
        assert!(report.warning().is_none());

        // The origin vertex pseudonormal points away from the solid
        let n = normals[0].verts[0];
        assert!(n.x < 0.0 && n.y < 0.0 && n.z < 0.0, "{n:?}");
        let expected = -Vector3::new(1.0, 1.0, 1.0).normalize();
        assert!((n - expected).norm() < 1e-6);

        // Edge 0 -> 2 of the bottom face is shared with the x = 0 face
        let e = normals[0].edges[0];
        let expected = Vector3::new(-1.0, 0.0, -1.0).normalize();
        assert!((e - expected).norm() < 1e-6, "{e:?}");
    }

    #[test]
    fn open_and_flipped() {
        let (verts, mut tris) = tetrahedron();
        tris.pop();
        let (_, report) = build(&tris, &triangles(&verts, &tris), verts.len());
        assert_eq!(report.boundary_edges, 3);
        assert!(matches!(
            report.warning(),
            Some(Warning::NonManifold {
                boundary_edges: 3,
                ..
            })
        ));

        let (verts, mut tris) = tetrahedron();
        tris[3] = [1, 3, 2];
        let (_, report) = build(&tris, &triangles(&verts, &tris), verts.len());
        assert_eq!(report.boundary_edges, 0);
        assert_eq!(report.misoriented_edges, 3);
    }
}
