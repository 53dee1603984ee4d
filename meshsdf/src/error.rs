//! Module containing the universal error type and non-fatal warnings
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason why a mesh was rejected during ingest
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidMeshReason {
    /// The mesh has no triangles
    #[error("mesh has no triangles")]
    NoTriangles,

    /// A vertex of the given triangle has a NaN or infinite coordinate
    #[error("triangle {triangle} has a non-finite vertex coordinate")]
    NonFinite {
        /// Index of the offending triangle in the source mesh
        triangle: usize,
    },

    /// A triangle refers to a vertex that does not exist
    #[error("vertex index {index} is out of range ({vertex_count} vertices)")]
    IndexOutOfRange {
        /// Offending index
        index: usize,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// Too many triangles have (near-)zero area
    #[error("{degenerate} of {total} triangles are degenerate")]
    TooManyDegenerate {
        /// Number of degenerate triangles
        degenerate: usize,
        /// Total number of triangles
        total: usize,
    },
}

/// Universal error type for SDF generation
#[derive(Error, Debug)]
pub enum Error {
    /// The named mesh cannot be turned into a distance field
    #[error("invalid mesh '{name}': {reason}")]
    InvalidMesh {
        /// Name of the offending mesh
        name: String,
        /// Reason for rejection
        reason: InvalidMeshReason,
    },

    /// Atlas layers were generated at different resolutions
    #[error(
        "resolution mismatch in atlas layer {layer}: \
         expected {expected}, got {actual}"
    )]
    ResolutionMismatch {
        /// Index of the offending layer
        layer: usize,
        /// Resolution requested for the atlas
        expected: usize,
        /// Resolution of the layer
        actual: usize,
    },

    /// Resolution must be a positive integer
    #[error("invalid resolution {0}; must be at least 1")]
    BadResolution(usize),

    /// Margin must be finite and non-negative
    #[error("invalid margin {0}; must be finite and non-negative")]
    BadMargin(f32),

    /// Explicit sampling bounds must be finite and non-empty
    #[error("invalid sampling bounds {min:?} to {max:?}")]
    BadBounds {
        /// Lower corner of the rejected box
        min: [f32; 3],
        /// Upper corner of the rejected box
        max: [f32; 3],
    },

    /// Decoded data is inconsistent with its own metadata
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// An atlas needs at least one layer
    #[error("cannot build an atlas with no layers")]
    EmptyAtlas,

    /// Each combined source needs exactly one transform
    #[error("got {transforms} transforms for {sources} mesh sources")]
    MismatchedTransforms {
        /// Number of mesh sources
        sources: usize,
        /// Number of transforms
        transforms: usize,
    },

    /// Generation was cancelled before completion
    #[error("generation was cancelled")]
    Cancelled,

    /// IO error; see inner code for details
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed ASCII STL file
    #[error("STL parse error on line {line}: {reason}")]
    StlParse {
        /// One-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },

    /// Serialization error; see inner code for details
    #[cfg(feature = "io")]
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl Error {
    /// Builds an [`Error::InvalidMesh`] for the named mesh
    pub fn invalid_mesh(name: &str, reason: InvalidMeshReason) -> Self {
        Error::InvalidMesh {
            name: name.to_owned(),
            reason,
        }
    }
}

/// Non-fatal problem detected while generating a field
///
/// Warnings are attached to the generated [`Volume`](crate::volume::Volume);
/// the unsigned distance is still valid, but the sign may be wrong near the
/// affected parts of the mesh.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// The mesh is not a closed, consistently wound 2-manifold
    #[error(
        "mesh is not a closed manifold ({boundary_edges} boundary edges, \
         {nonmanifold_edges} non-manifold edges, \
         {misoriented_edges} misoriented edges); sign may be unreliable"
    )]
    NonManifold {
        /// Edges used by exactly one triangle
        boundary_edges: usize,
        /// Edges used by more than two triangles
        nonmanifold_edges: usize,
        /// Edges traversed in the same direction by both of their triangles
        misoriented_edges: usize,
    },

    /// Some zero-area triangles were dropped during ingest
    #[error("dropped {count} degenerate triangles")]
    DegenerateTriangles {
        /// Number of dropped triangles
        count: usize,
    },
}
