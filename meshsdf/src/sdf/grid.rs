//! Dense grid of signed distance samples
use crate::{error::Warning, types::Aabb};
use nalgebra::Point3;
use serde::Serialize;

/// Returns the world-space position of grid index `i` along one axis
///
/// Indices `0` and `resolution - 1` land exactly on the box faces; a grid with
/// a single sample places it at the box center.
#[inline]
pub(crate) fn axis_position(
    min: f32,
    extent: f32,
    resolution: usize,
    i: usize,
) -> f32 {
    if resolution <= 1 {
        min + extent / 2.0
    } else {
        min + i as f32 / (resolution - 1) as f32 * extent
    }
}

/// Returns the number of samples in a cubic grid, if it can be allocated
pub(crate) fn voxel_count(resolution: usize) -> Option<usize> {
    sample_count(resolution, resolution)
}

/// Returns the number of samples in `layers` square slices of a grid
pub(crate) fn sample_count(resolution: usize, layers: usize) -> Option<usize> {
    resolution
        .checked_mul(resolution)?
        .checked_mul(layers)
        .filter(|n| {
            n.checked_mul(std::mem::size_of::<f32>())
                .is_some_and(|b| b <= isize::MAX as usize)
        })
}

/// Returns the world-space position of the voxel at `(x, y, z)`
pub(crate) fn voxel_position(
    bounds: &Aabb,
    resolution: usize,
    x: usize,
    y: usize,
    z: usize,
) -> Point3<f32> {
    let e = bounds.extents();
    Point3::new(
        axis_position(bounds.min.x, e.x, resolution, x),
        axis_position(bounds.min.y, e.y, resolution, y),
        axis_position(bounds.min.z, e.z, resolution, z),
    )
}

/// Cubic grid of signed distances
///
/// Samples are stored with X varying fastest, i.e. the sample at `(x, y, z)`
/// is at index `x + y * R + z * R²`.  Negative values are inside the mesh.
///
/// Grids are only built by the generator, so their shape always matches
/// their resolution; use [`Volume`](crate::volume::Volume) to load a field
/// back from storage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoxelGrid {
    pub(crate) name: String,
    pub(crate) resolution: usize,
    pub(crate) bounds: Aabb,
    pub(crate) data: Vec<f32>,
    pub(crate) warnings: Vec<Warning>,
}

impl VoxelGrid {
    /// Name of the mesh (or meshes) that this grid was generated from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of samples along each axis
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Sampled region; the outermost samples lie on its faces
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Raw sample data, in X-fastest order
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Non-fatal problems found while generating the grid
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the flat index of the sample at `(x, y, z)`
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        let r = self.resolution;
        x + y * r + z * r * r
    }

    /// Returns the sample at `(x, y, z)`, or `None` if out of range
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let r = self.resolution;
        if x < r && y < r && z < r {
            Some(self.data[self.index(x, y, z)])
        } else {
            None
        }
    }

    /// Returns the world-space position at which `(x, y, z)` was sampled
    pub fn position(&self, x: usize, y: usize, z: usize) -> Point3<f32> {
        voxel_position(&self.bounds, self.resolution, x, y, z)
    }

    /// Returns the XY slice at the given Z index, in X-fastest order
    pub fn slice_z(&self, z: usize) -> &[f32] {
        let n = self.resolution * self.resolution;
        let z = z.min(self.resolution - 1);
        &self.data[z * n..(z + 1) * n]
    }

    /// Consumes the grid, returning its sample data
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}
