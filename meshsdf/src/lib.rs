//! `meshsdf` converts triangle meshes into volumetric signed distance fields.
//!
//! A **signed distance field** (SDF) is a 3D grid where each sample is the
//! distance from its position to the nearest point on a surface.  By
//! convention, samples **inside** the mesh are negative and samples
//! **outside** are positive.  Distances are in the same units as the mesh.
//!
//! # Generating a field
//! Meshes are given as plain geometry: a [`Mesh`](mesh::Mesh) holds vertex
//! positions and triangle indices, and a [`MeshSource`](mesh::MeshSource)
//! attaches a name and a 4×4 model-to-world transform.
//!
//! ```
//! use meshsdf::{
//!     mesh::{MeshSource, shapes},
//!     sdf::{self, SdfConfig},
//!     volume::Volume,
//! };
//!
//! let sphere = MeshSource::new("sphere", shapes::icosphere(1.0, 3));
//! let cfg = SdfConfig {
//!     resolution: 16,
//!     ..Default::default()
//! };
//! let grid = sdf::generate(&sphere, &cfg)?;
//!
//! // The field is sampled on a box around the mesh, padded by 10% of its
//! // diagonal on each side
//! let bounds = grid.bounds();
//! assert!(bounds.min.x < -1.0 && bounds.max.x > 1.0);
//!
//! // Wrap the grid in a clamp-to-edge, trilinear volume for sampling
//! let vol = Volume::from(grid);
//! let d = vol.sample_world(&nalgebra::Point3::origin());
//! assert!((d + 1.0).abs() < 0.1);
//! # Ok::<(), meshsdf::Error>(())
//! ```
//!
//! Signs are determined with angle-weighted pseudonormals, which are only
//! reliable for closed, consistently wound meshes.  Other meshes still
//! produce valid unsigned distances, with a [`Warning`] attached to the
//! result.
//!
//! # Batches and atlases
//! [`sdf::generate_batch`] generates one field per mesh in parallel,
//! collecting per-mesh results (including failures) into a
//! [`BatchReport`](sdf::BatchReport).  [`sdf::generate_combined`] merges
//! several transformed meshes into a single field.  Fields of equal
//! resolution may be packed into a layered 2D [`Atlas`](atlas::Atlas) with
//! [`atlas::pack`].
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]

mod error;
pub use error::{Error, InvalidMeshReason, Warning};

pub mod atlas;
pub mod bvh;
pub mod mesh;
pub mod sdf;
pub mod types;
pub mod volume;
