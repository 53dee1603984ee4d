//! Geometry ingest: flattening mesh sources into a triangle soup
use super::{MeshSource, Pseudonormals, TopologyReport, Triangle, topology};
use crate::{
    error::{Error, InvalidMeshReason, Warning},
    types::{Aabb, Feature},
};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// Settings controlling how meshes are validated during ingest
#[derive(Copy, Clone, Debug)]
pub struct IngestSettings {
    /// Relative area threshold for degenerate triangles
    ///
    /// A triangle is degenerate if its area is at most
    /// `degenerate_area * diagonal²`, where `diagonal` is the length of the
    /// diagonal of the combined bounding box.
    pub degenerate_area: f32,

    /// Largest fraction of degenerate triangles that is tolerated
    ///
    /// Degenerate triangles are dropped; if more than this fraction of the
    /// input is degenerate, the mesh is rejected.
    pub max_degenerate_fraction: f32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            degenerate_area: 1e-12,
            max_degenerate_fraction: 0.5,
        }
    }
}

/// Flat, read-only set of triangles with connectivity-derived pseudonormals
///
/// Vertices with bit-identical positions (after transformation) are welded
/// together, so that meshes stored without shared vertices (e.g. STL files)
/// still have the connectivity needed for sign determination.
pub struct Soup {
    name: String,
    triangles: Vec<Triangle>,
    normals: Vec<Pseudonormals>,
    bounds: Aabb,
    topology: TopologyReport,
    degenerate: usize,
}

/// Welds positions into a shared vertex list
#[derive(Default)]
struct Welder {
    positions: Vec<Point3<f32>>,
    map: HashMap<[u32; 3], u32>,
}

impl Welder {
    fn insert(&mut self, p: Point3<f32>) -> u32 {
        // Adding 0.0 folds -0.0 into +0.0
        let key = [p.x, p.y, p.z].map(|v| (v + 0.0).to_bits());
        *self.map.entry(key).or_insert_with(|| {
            self.positions.push(p);
            (self.positions.len() - 1) as u32
        })
    }
}

impl Soup {
    /// Builds a soup from a single mesh source
    pub fn new(
        source: &MeshSource,
        settings: &IngestSettings,
    ) -> Result<Self, Error> {
        Self::combine(std::slice::from_ref(source), settings)
    }

    /// Builds a soup from multiple mesh sources
    ///
    /// Each source's vertices are mapped through its own transform into a
    /// common space before merging.  Every source must be valid on its own;
    /// errors name the offending source.
    pub fn combine(
        sources: &[MeshSource],
        settings: &IngestSettings,
    ) -> Result<Self, Error> {
        let name = sources
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join("+");
        if sources.is_empty() {
            return Err(Error::invalid_mesh(
                "<none>",
                InvalidMeshReason::NoTriangles,
            ));
        }

        let mut welder = Welder::default();
        let mut indices: Vec<[u32; 3]> = vec![];
        for source in sources {
            let mesh = &source.mesh;
            if mesh.triangles.is_empty() {
                return Err(Error::invalid_mesh(
                    &source.name,
                    InvalidMeshReason::NoTriangles,
                ));
            }

            // Map from local vertex index to welded index, populated lazily
            let mut local = vec![u32::MAX; mesh.vertices.len()];
            for (t, tri) in mesh.triangles.iter().enumerate() {
                let mut out = [0u32; 3];
                for (o, &v) in out.iter_mut().zip(tri.iter()) {
                    if v >= mesh.vertices.len() {
                        return Err(Error::invalid_mesh(
                            &source.name,
                            InvalidMeshReason::IndexOutOfRange {
                                index: v,
                                vertex_count: mesh.vertices.len(),
                            },
                        ));
                    }
                    if local[v] == u32::MAX {
                        let p = source
                            .transform
                            .transform_point(&Point3::from(mesh.vertices[v]));
                        if !mesh.vertices[v].iter().all(|c| c.is_finite())
                            || !p.iter().all(|c| c.is_finite())
                        {
                            return Err(Error::invalid_mesh(
                                &source.name,
                                InvalidMeshReason::NonFinite { triangle: t },
                            ));
                        }
                        local[v] = welder.insert(p);
                    }
                    *o = local[v];
                }
                indices.push(out);
            }
        }

        let positions = welder.positions;
        let bounds = Aabb::from_points(&positions);
        let threshold = settings.degenerate_area * bounds.diagonal().powi(2);

        let total = indices.len();
        let mut triangles = Vec::with_capacity(total);
        let mut kept = Vec::with_capacity(total);
        for idx in indices {
            let [a, b, c] = idx.map(|i| positions[i as usize]);
            let t = Triangle::new(a, b, c);
            if t.normal() != Vector3::zeros() && t.area() > threshold {
                triangles.push(t);
                kept.push(idx);
            }
        }
        let degenerate = total - triangles.len();
        let max_degenerate = settings.max_degenerate_fraction * total as f32;
        if triangles.is_empty() || degenerate as f32 > max_degenerate {
            return Err(Error::invalid_mesh(
                &name,
                InvalidMeshReason::TooManyDegenerate { degenerate, total },
            ));
        }

        let (normals, topology) =
            topology::build(&kept, &triangles, positions.len());
        let bounds = triangles
            .iter()
            .fold(Aabb::empty(), |b, t| b.union(t.bounds()));

        Ok(Self {
            name,
            triangles,
            normals,
            bounds,
            topology,
            degenerate,
        })
    }

    /// Returns the soup's name (sources joined with `+`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the triangles in the soup
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Returns the number of triangles
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Checks whether the soup is empty (which never happens after ingest)
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Returns the tight bounding box of all triangles
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Returns the connectivity report
    pub fn topology(&self) -> &TopologyReport {
        &self.topology
    }

    /// Returns the normal to use for sign determination at a closest point
    #[inline]
    pub fn pseudonormal(&self, tri: usize, feature: Feature) -> Vector3<f32> {
        self.normals[tri].get(self.triangles[tri].normal(), feature)
    }

    /// Returns non-fatal problems found during ingest
    pub fn warnings(&self) -> Vec<Warning> {
        let mut out = vec![];
        if self.degenerate > 0 {
            out.push(Warning::DegenerateTriangles {
                count: self.degenerate,
            });
        }
        out.extend(self.topology.warning());
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::{Mesh, shapes};
    use nalgebra::Matrix4;

    #[test]
    fn empty_mesh_is_rejected() {
        let src = MeshSource::new("empty", Mesh::new());
        let err = Soup::new(&src, &IngestSettings::default())
            .err()
            .expect("empty mesh must be rejected");
        assert!(matches!(
            err,
            Error::InvalidMesh {
                ref name,
                reason: InvalidMeshReason::NoTriangles
            } if name == "empty"
        ));
    }

    #[test]
    fn non_finite_is_rejected() {
        let mut mesh = shapes::cube(1.0);
        mesh.vertices[3].y = f32::NAN;
        let src = MeshSource::new("nan", mesh);
        let err = Soup::new(&src, &IngestSettings::default()).err();
        assert!(matches!(
            err,
            Some(Error::InvalidMesh {
                reason: InvalidMeshReason::NonFinite { .. },
                ..
            })
        ));
    }

    #[test]
    fn bad_index_is_rejected() {
        let mut mesh = shapes::cube(1.0);
        mesh.triangles[0].z = 100;
        let src = MeshSource::new("idx", mesh);
        let err = Soup::new(&src, &Default::default()).err();
        assert!(matches!(
            err,
            Some(Error::InvalidMesh {
                reason: InvalidMeshReason::IndexOutOfRange {
                    index: 100,
                    vertex_count: 8
                },
                ..
            })
        ));
    }

    #[test]
    fn degenerate_triangles() {
        let mut mesh = shapes::cube(1.0);
        let n = mesh.triangles.len();
        // A sliver triangle collapsing onto a single vertex
        mesh.triangles.push(nalgebra::Vector3::new(0, 0, 0));
        let src = MeshSource::new("cube", mesh.clone());
        let soup = Soup::new(&src, &Default::default()).unwrap();
        assert_eq!(soup.len(), n);
        assert_eq!(
            soup.warnings(),
            vec![Warning::DegenerateTriangles { count: 1 }]
        );

        let settings = IngestSettings {
            max_degenerate_fraction: 0.0,
            ..Default::default()
        };
        let err = Soup::new(&MeshSource::new("cube", mesh), &settings).err();
        assert!(matches!(
            err,
            Some(Error::InvalidMesh {
                reason: InvalidMeshReason::TooManyDegenerate {
                    degenerate: 1,
                    total: 13
                },
                ..
            })
        ));
    }

    #[test]
    fn welding_recovers_topology() {
        // Unshare every vertex, as an STL file would
        let cube = shapes::cube(2.0);
        let mut mesh = Mesh::new();
        for t in &cube.triangles {
            let i = mesh.vertices.len();
            for v in t.iter() {
                mesh.vertices.push(cube.vertices[*v]);
            }
            mesh.triangles.push(nalgebra::Vector3::new(i, i + 1, i + 2));
        }
        let src = MeshSource::new("cube", mesh);
        let soup = Soup::new(&src, &Default::default()).unwrap();
        assert!(soup.topology().is_closed_manifold());
        assert!(soup.warnings().is_empty());
    }

    #[test]
    fn combined_transforms() {
        let a = MeshSource::new("a", shapes::cube(1.0));
        let b = MeshSource::new("b", shapes::cube(1.0)).with_transform(
            Matrix4::new_translation(&nalgebra::Vector3::new(3.0, 0.0, 0.0))
                * Matrix4::new_scaling(2.0),
        );
        let soup = Soup::combine(&[a, b], &Default::default()).unwrap();
        assert_eq!(soup.name(), "a+b");
        assert_eq!(soup.len(), 24);
        assert_eq!(soup.bounds().min, Point3::new(-0.5, -1.0, -1.0));
        assert_eq!(soup.bounds().max, Point3::new(4.0, 1.0, 1.0));
        assert!(soup.topology().is_closed_manifold());
    }
}
