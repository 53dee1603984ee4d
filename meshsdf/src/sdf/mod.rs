//! Signed distance field generation
//!
//! Each generation request runs the whole pipeline for one field:
//!
//! - The mesh source (or sources) are validated and flattened into a
//!   [`Soup`](crate::mesh::Soup)
//! - A [`Bvh`](crate::bvh::Bvh) is built over the soup's triangles
//! - Every voxel of an `R × R × R` grid is sampled in parallel, finding the
//!   nearest triangle and using its angle-weighted pseudonormal to pick a sign
//!
//! The result is a [`VoxelGrid`], which is only returned once completely
//! filled.  Signs are only reliable for closed, consistently wound meshes;
//! other meshes produce a [`Warning`](crate::Warning) attached to the grid.
//!
//! ```
//! use meshsdf::{mesh::{MeshSource, shapes}, sdf::SdfConfig};
//!
//! let cube = MeshSource::new("cube", shapes::cube(1.0));
//! let cfg = SdfConfig {
//!     resolution: 9,
//!     ..Default::default()
//! };
//! let grid = meshsdf::sdf::generate(&cube, &cfg)?;
//! assert_eq!(grid.data().len(), 9 * 9 * 9);
//! assert!(grid.get(4, 4, 4).unwrap() < 0.0); // inside
//! assert!(grid.get(0, 0, 0).unwrap() > 0.0); // outside
//! # Ok::<(), meshsdf::Error>(())
//! ```
use crate::{Error, mesh::MeshSource, mesh::Soup};
use log::{info, warn};
use rayon::prelude::*;
use std::time::Instant;

mod config;
pub(crate) mod grid;
mod sampler;

pub use config::{CancelToken, Resolution, SdfConfig, ThreadPool};
pub use grid::VoxelGrid;
pub(crate) use grid::voxel_position;

impl SdfConfig<'_> {
    /// Checks that the resolution, margin and bounds are usable
    ///
    /// The resolution must be positive and small enough that the grid can be
    /// allocated.  Explicit bounds must be finite with `min <= max` on every
    /// axis; flat boxes are allowed.
    pub fn validate(&self) -> Result<(), Error> {
        if self.resolution == 0 || grid::voxel_count(self.resolution).is_none()
        {
            return Err(Error::BadResolution(self.resolution));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(Error::BadMargin(self.margin));
        }
        if let Some(b) = &self.bounds {
            let finite =
                b.min.iter().chain(b.max.iter()).all(|v| v.is_finite());
            if !finite || b.is_empty() {
                return Err(Error::BadBounds {
                    min: b.min.into(),
                    max: b.max.into(),
                });
            }
        }
        Ok(())
    }
}

/// Generates a signed distance field for a single mesh source
///
/// The source's transform is applied, so the field is sampled in its world
/// space.
pub fn generate(
    source: &MeshSource,
    config: &SdfConfig,
) -> Result<VoxelGrid, Error> {
    config.validate()?;
    let soup = Soup::new(source, &config.ingest)?;
    run(&soup, config)
}

/// Generates one signed distance field for several mesh sources
///
/// Each source's vertices are mapped through its transform into a common
/// space; the merged soup is then sampled as a single mesh.
pub fn generate_combined(
    sources: &[MeshSource],
    config: &SdfConfig,
) -> Result<VoxelGrid, Error> {
    config.validate()?;
    let soup = Soup::combine(sources, &config.ingest)?;
    run(&soup, config)
}

fn run(soup: &Soup, config: &SdfConfig) -> Result<VoxelGrid, Error> {
    for w in soup.warnings() {
        warn!("'{}': {w}", soup.name());
    }
    let start = Instant::now();
    let grid = sampler::sample_soup(soup, config)?;
    info!(
        "generated {}³ field for '{}' in {:?}",
        grid.resolution(),
        grid.name(),
        start.elapsed()
    );
    Ok(grid)
}

/// Result of generating a single field in a batch
#[derive(Debug)]
pub struct BatchItem {
    /// Name of the mesh source
    pub name: String,
    /// Generated grid, or the reason that generation failed
    pub result: Result<VoxelGrid, Error>,
}

/// Per-mesh results of a batch generation, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One item per input mesh source
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    /// Iterates over successfully generated grids
    pub fn successes(&self) -> impl Iterator<Item = &VoxelGrid> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    /// Iterates over failures, as `(name, error)` tuples
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.items.iter().filter_map(|i| {
            i.result.as_ref().err().map(|e| (i.name.as_str(), e))
        })
    }

    /// Checks whether every item succeeded
    pub fn is_success(&self) -> bool {
        self.items.iter().all(|i| i.result.is_ok())
    }
}

/// Generates an independent field for each mesh source
///
/// Meshes are processed in parallel (if the config has a thread pool).  A
/// failure for one mesh is recorded in the report and does not affect the
/// others.
pub fn generate_batch(
    sources: &[MeshSource],
    config: &SdfConfig,
) -> BatchReport {
    let f = |source: &MeshSource| {
        let result = generate(source, config);
        if let Err(e) = &result {
            warn!("failed to generate field for '{}': {e}", source.name);
        }
        BatchItem {
            name: source.name.clone(),
            result,
        }
    };
    let items = match config.threads {
        None => sources.iter().map(f).collect(),
        Some(p) => p.run(|| sources.par_iter().map(f).collect()),
    };
    BatchReport { items }
}
