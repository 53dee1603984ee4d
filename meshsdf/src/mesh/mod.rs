//! Triangle meshes and their conversion into a flat triangle soup
//!
//! A [`Mesh`] is an indexed triangle mesh, as loaded from a file or built with
//! the generators in [`shapes`].  A [`MeshSource`] attaches a name and a
//! model-to-world transform to a mesh; one or more sources are flattened into
//! a [`Soup`], which is the read-only input to distance field generation.
use nalgebra::{Matrix4, Vector3};

mod soup;
mod topology;
mod triangle;

pub mod shapes;

#[cfg(feature = "io")]
mod stl;

pub use soup::{IngestSettings, Soup};
pub use topology::{Pseudonormals, TopologyReport};
pub use triangle::Triangle;

/// An indexed 3D mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Triangles, as indexes into [`self.vertices`](Self::vertices)
    ///
    /// Triangles are wound counter-clockwise when seen from outside.
    pub triangles: Vec<Vector3<usize>>,
    /// Vertex positions
    pub vertices: Vec<Vector3<f32>>,
}

impl Mesh {
    /// Builds a new, empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of triangles
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Checks whether the mesh has any triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Appends a second mesh, re-indexing its triangles
    pub fn extend(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles
            .extend(other.triangles.iter().map(|t| t.add_scalar(offset)));
    }
}

/// A named mesh with a model-to-world transform
#[derive(Clone, Debug)]
pub struct MeshSource {
    /// Name used in logs, errors, and output file names
    pub name: String,
    /// Mesh data, in local coordinates
    pub mesh: Mesh,
    /// Homogeneous transform from local to world coordinates
    pub transform: Matrix4<f32>,
}

impl MeshSource {
    /// Builds a source with an identity transform
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            mesh,
            transform: Matrix4::identity(),
        }
    }

    /// Replaces the source's transform
    pub fn with_transform(self, transform: Matrix4<f32>) -> Self {
        Self { transform, ..self }
    }
}
