//! Volumetric texture output
//!
//! A [`Volume`] is the resource handed to downstream consumers (ray marchers,
//! physics proxies, file writers).  It carries the signed distance samples
//! along with the sampling state that consumers must honor: addressing
//! outside of `[0, 1]` texture coordinates clamps to the edge, and lookups
//! between samples are trilinearly interpolated.
use crate::{error::Warning, sdf::VoxelGrid, sdf::voxel_position, types::Aabb};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// How texture coordinates outside of `[0, 1]` are handled
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum AddressMode {
    /// Coordinates are clamped into `[0, 1]`
    #[default]
    ClampToEdge,
    /// Coordinates wrap around with a period of 1
    Repeat,
}

impl AddressMode {
    fn apply(self, u: f32) -> f32 {
        match self {
            AddressMode::ClampToEdge => u.clamp(0.0, 1.0),
            AddressMode::Repeat => u.rem_euclid(1.0),
        }
    }
}

/// How values between samples are reconstructed
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum FilterMode {
    /// Trilinear interpolation of the 8 surrounding samples
    #[default]
    Trilinear,
    /// Value of the closest sample
    Nearest,
}

/// Single-channel `f32` 3D texture holding a signed distance field
///
/// Texture coordinate `0` along an axis refers to the first sample and `1`
/// to the last, matching the world-space mapping of the source grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    name: String,
    resolution: usize,
    bounds: Aabb,
    address_mode: AddressMode,
    filter_mode: FilterMode,
    data: Vec<f32>,
    warnings: Vec<Warning>,
}

impl From<VoxelGrid> for Volume {
    fn from(grid: VoxelGrid) -> Self {
        Self::new(grid)
    }
}

impl Volume {
    /// Builds a clamp-to-edge, trilinear volume from a voxel grid
    pub fn new(grid: VoxelGrid) -> Self {
        Self {
            name: grid.name,
            resolution: grid.resolution,
            bounds: grid.bounds,
            address_mode: AddressMode::ClampToEdge,
            filter_mode: FilterMode::Trilinear,
            data: grid.data,
            warnings: grid.warnings,
        }
    }

    /// Returns a copy of this volume with a different address mode
    pub fn with_address_mode(self, address_mode: AddressMode) -> Self {
        Self {
            address_mode,
            ..self
        }
    }

    /// Returns a copy of this volume with a different filter mode
    pub fn with_filter_mode(self, filter_mode: FilterMode) -> Self {
        Self {
            filter_mode,
            ..self
        }
    }

    /// Name of the source mesh
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of samples along each axis
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Texture size, as `[width, height, depth]`
    pub fn extents(&self) -> [usize; 3] {
        [self.resolution; 3]
    }

    /// World-space region covered by the volume
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Addressing mode for out-of-range coordinates
    pub fn address_mode(&self) -> AddressMode {
        self.address_mode
    }

    /// Filtering mode between samples
    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Raw samples, with X varying fastest
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Warnings produced while generating the field
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Returns the sample at the given integer coordinates
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let r = self.resolution;
        if x < r && y < r && z < r {
            Some(self.data[x + y * r + z * r * r])
        } else {
            None
        }
    }

    /// Returns the world-space position of the sample at `(x, y, z)`
    pub fn voxel_position(&self, x: usize, y: usize, z: usize) -> Point3<f32> {
        voxel_position(&self.bounds, self.resolution, x, y, z)
    }

    /// Samples the volume at the given texture coordinates
    ///
    /// The volume's address and filter modes are applied.
    pub fn sample(&self, uvw: &Point3<f32>) -> f32 {
        let r = self.resolution;
        if r == 1 {
            return self.data[0];
        }
        let scale = (r - 1) as f32;
        let c = uvw.map(|u| self.address_mode.apply(u) * scale);
        match self.filter_mode {
            FilterMode::Nearest => {
                let [x, y, z] = [c.x, c.y, c.z].map(|v| v.round() as usize);
                self.data[x + y * r + z * r * r]
            }
            FilterMode::Trilinear => {
                // Lower corner of the cell, kept in range so that the upper
                // corner is a valid sample as well
                let i = c.map(|v| (v.floor() as usize).min(r - 2));
                let f = Vector3::new(
                    c.x - i.x as f32,
                    c.y - i.y as f32,
                    c.z - i.z as f32,
                );
                let at = |dx: usize, dy: usize, dz: usize| {
                    self.data[(i.x + dx) + (i.y + dy) * r + (i.z + dz) * r * r]
                };
                let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
                let x00 = lerp(at(0, 0, 0), at(1, 0, 0), f.x);
                let x10 = lerp(at(0, 1, 0), at(1, 1, 0), f.x);
                let x01 = lerp(at(0, 0, 1), at(1, 0, 1), f.x);
                let x11 = lerp(at(0, 1, 1), at(1, 1, 1), f.x);
                let y0 = lerp(x00, x10, f.y);
                let y1 = lerp(x01, x11, f.y);
                lerp(y0, y1, f.z)
            }
        }
    }

    /// Samples the volume at a world-space position
    pub fn sample_world(&self, p: &Point3<f32>) -> f32 {
        let e = self.bounds.extents();
        let uvw = Point3::new(
            Self::to_texture(p.x, self.bounds.min.x, e.x),
            Self::to_texture(p.y, self.bounds.min.y, e.y),
            Self::to_texture(p.z, self.bounds.min.z, e.z),
        );
        self.sample(&uvw)
    }

    fn to_texture(p: f32, min: f32, extent: f32) -> f32 {
        if extent > 0.0 { (p - min) / extent } else { 0.5 }
    }
}

#[cfg(feature = "io")]
impl Volume {
    /// Serializes the volume (data and metadata) with `bincode`
    pub fn write<W: std::io::Write>(&self, out: W) -> Result<(), crate::Error> {
        bincode::serialize_into(out, self)?;
        Ok(())
    }

    /// Deserializes a volume written by [`Volume::write`]
    ///
    /// Returns [`Error::CorruptData`](crate::Error::CorruptData) if the
    /// decoded sample count does not match the decoded resolution.
    pub fn read<R: std::io::Read>(input: R) -> Result<Self, crate::Error> {
        let v: Self = bincode::deserialize_from(input)?;
        let expected = crate::sdf::grid::voxel_count(v.resolution);
        if v.resolution == 0 || expected != Some(v.data.len()) {
            return Err(crate::Error::CorruptData(format!(
                "volume '{}' has resolution {} but {} samples",
                v.name,
                v.resolution,
                v.data.len()
            )));
        }
        Ok(v)
    }

    /// Writes the bare sample data as little-endian `f32` values
    ///
    /// The output has no header; resolution and bounds must be stored
    /// separately.
    pub fn write_raw<W: std::io::Write>(
        &self,
        mut out: W,
    ) -> Result<(), crate::Error> {
        use zerocopy::{IntoBytes, little_endian::F32};
        let data: Vec<F32> = self.data.iter().map(|v| F32::new(*v)).collect();
        out.write_all(data.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        mesh::{MeshSource, shapes},
        sdf::{self, SdfConfig},
    };
    use approx::assert_relative_eq;

    /// Volume holding the linear function `x + 2y + 4z` on a unit box
    fn linear(r: usize) -> Volume {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let mut data = vec![];
        for z in 0..r {
            for y in 0..r {
                for x in 0..r {
                    let p = voxel_position(&bounds, r, x, y, z);
                    data.push(p.x + 2.0 * p.y + 4.0 * p.z);
                }
            }
        }
        Volume {
            name: "linear".to_owned(),
            resolution: r,
            bounds,
            address_mode: AddressMode::ClampToEdge,
            filter_mode: FilterMode::Trilinear,
            data,
            warnings: vec![],
        }
    }

    #[test]
    fn trilinear_is_exact_for_linear_fields() {
        let v = linear(5);
        for p in [
            Point3::new(0.1, 0.2, 0.3),
            Point3::new(0.5, 0.5, 0.5),
            Point3::new(0.99, 0.01, 0.7),
            Point3::new(1.0, 1.0, 1.0),
        ] {
            assert_relative_eq!(
                v.sample(&p),
                p.x + 2.0 * p.y + 4.0 * p.z,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn clamp_to_edge() {
        let v = linear(5);
        assert_eq!(v.address_mode(), AddressMode::ClampToEdge);
        assert_eq!(v.filter_mode(), FilterMode::Trilinear);
        assert_relative_eq!(v.sample(&Point3::new(-3.0, 0.0, 0.0)), 0.0);
        assert_relative_eq!(v.sample(&Point3::new(5.0, 5.0, 5.0)), 7.0);
        assert_relative_eq!(
            v.sample(&Point3::new(2.0, 0.5, -1.0)),
            1.0 + 1.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn other_modes() {
        let v = linear(3)
            .with_filter_mode(FilterMode::Nearest)
            .with_address_mode(AddressMode::Repeat);
        // 0.2 snaps to the first sample, 0.8 to the last
        assert_eq!(v.sample(&Point3::new(0.2, 0.8, 0.0)), 2.0);
        assert_relative_eq!(v.sample(&Point3::new(1.4, 0.0, 0.0)), 0.5);
    }

    #[test]
    fn world_sampling() {
        let cube = MeshSource::new("cube", shapes::cube(1.0));
        let cfg = SdfConfig {
            resolution: 11,
            bounds: Some(Aabb::new(
                Point3::new(-1.0, -1.0, -1.0),
                Point3::new(1.0, 1.0, 1.0),
            )),
            ..Default::default()
        };
        let vol = Volume::from(sdf::generate(&cube, &cfg).unwrap());
        assert_eq!(vol.extents(), [11, 11, 11]);
        assert_eq!(vol.voxel_position(5, 5, 5), Point3::origin());
        assert_relative_eq!(vol.sample_world(&Point3::origin()), -0.5);
        // Between samples along a face normal, the field is linear
        assert_relative_eq!(
            vol.sample_world(&Point3::new(0.75, 0.0, 0.0)),
            0.25,
            epsilon = 1e-5
        );
        assert_eq!(vol.get(5, 5, 5), Some(-0.5));
        assert_eq!(vol.get(11, 0, 0), None);
    }

    #[cfg(feature = "io")]
    #[test]
    fn io() {
        let v = linear(4);
        let mut buf = vec![];
        v.write(&mut buf).unwrap();
        let out = Volume::read(buf.as_slice()).unwrap();
        assert_eq!(v, out);

        let mut raw = vec![];
        v.write_raw(&mut raw).unwrap();
        assert_eq!(raw.len(), 4 * 64);
        assert_eq!(&raw[4..8], &v.data()[1].to_le_bytes());
    }

    #[cfg(feature = "io")]
    #[test]
    fn corrupt_io() {
        for (resolution, len) in [(9, 64), (0, 0), (4, 63), (1 << 22, 64)] {
            let mut v = linear(4);
            v.resolution = resolution;
            v.data.truncate(len);
            let mut buf = vec![];
            v.write(&mut buf).unwrap();
            assert!(
                matches!(
                    Volume::read(buf.as_slice()),
                    Err(crate::Error::CorruptData(..))
                ),
                "resolution {resolution} with {len} samples was accepted"
            );
        }

        let mut buf = vec![];
        linear(4).write(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(
            Volume::read(buf.as_slice()),
            Err(crate::Error::Codec(..))
        ));
    }
}
