//! Per-voxel signed distance sampling
use super::{
    SdfConfig, VoxelGrid,
    grid::{voxel_count, voxel_position},
};
use crate::{
    Error,
    bvh::{Bvh, NearestQuery},
    mesh::Soup,
    types::Aabb,
};
use log::debug;
use rayon::prelude::*;
use std::time::Instant;

/// Read-only state shared by every worker during sampling
struct Sampler<'a> {
    soup: &'a Soup,
    bvh: &'a Bvh,
    bounds: Aabb,
    resolution: usize,
}

impl Sampler<'_> {
    /// Returns the signed distance at `p`
    ///
    /// Also returns the nearest triangle, which is used as a hint for the
    /// next sample.
    #[inline]
    fn sample(
        &self,
        query: &mut NearestQuery,
        p: &nalgebra::Point3<f32>,
        hint: Option<usize>,
    ) -> (f32, Option<usize>) {
        let tris = self.soup.triangles();
        let Some(n) = self.bvh.nearest_with(query, tris, p, hint) else {
            return (f32::INFINITY, None);
        };
        let normal = self.soup.pseudonormal(n.triangle, n.feature);
        let inside = (p - n.point).dot(&normal) < 0.0;
        let d = if inside { -n.distance } else { n.distance };
        (d, Some(n.triangle))
    }

    /// Fills one XY slab of the grid at the given Z index
    fn fill_slab(&self, query: &mut NearestQuery, z: usize, slab: &mut [f32]) {
        let r = self.resolution;
        for (y, row) in slab.chunks_mut(r).enumerate() {
            let mut hint = None;
            for (x, v) in row.iter_mut().enumerate() {
                let p = voxel_position(&self.bounds, r, x, y, z);
                (*v, hint) = self.sample(query, &p, hint);
            }
        }
    }
}

/// Samples the signed distance field of a soup
///
/// The configuration must already be validated.  Returns
/// [`Error::Cancelled`] if the cancel token is set before every slab is
/// filled; the partial grid is dropped.
pub(crate) fn sample_soup(
    soup: &Soup,
    config: &SdfConfig,
) -> Result<VoxelGrid, Error> {
    let start = Instant::now();
    let bvh = Bvh::build(soup.triangles());
    debug!(
        "built BVH for '{}' ({} triangles, {} nodes, depth {}) in {:?}",
        soup.name(),
        soup.len(),
        bvh.nodes().len(),
        bvh.depth(),
        start.elapsed()
    );

    let r = config.resolution;
    let n = voxel_count(r).ok_or(Error::BadResolution(r))?;
    let sampler = Sampler {
        soup,
        bvh: &bvh,
        bounds: config.sample_bounds(soup.bounds()),
        resolution: r,
    };

    let start = Instant::now();
    let mut data = vec![0.0f32; n];
    let run = |query: &mut NearestQuery, (z, slab): (usize, &mut [f32])| {
        if config.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            sampler.fill_slab(query, z, slab);
            Ok(())
        }
    };
    match config.threads {
        None => {
            let mut query = NearestQuery::default();
            data.chunks_mut(r * r)
                .enumerate()
                .try_for_each(|s| run(&mut query, s))?;
        }
        Some(p) => p.run(|| {
            data.par_chunks_mut(r * r)
                .enumerate()
                .map_init(NearestQuery::default, run)
                .collect::<Result<(), Error>>()
        })?,
    }
    debug!(
        "sampled {r}³ voxels for '{}' in {:?}",
        soup.name(),
        start.elapsed()
    );

    Ok(VoxelGrid {
        name: soup.name().to_owned(),
        resolution: r,
        bounds: sampler.bounds,
        data,
        warnings: soup.warnings(),
    })
}
