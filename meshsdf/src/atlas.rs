//! Packing of several fields into a layered 2D atlas
//!
//! Each layer of an [`Atlas`] is a 2D reduction of one independently
//! generated [`VoxelGrid`].  The reduction is fixed per atlas and recorded in
//! it, because it determines what the stored values mean.
use crate::{
    Error,
    sdf::VoxelGrid,
    types::Aabb,
    volume::{AddressMode, FilterMode},
};
use log::info;
use serde::{Deserialize, Serialize};

/// Method used to reduce a 3D field to a single 2D layer
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Reduction {
    /// The XY slice at Z index `resolution / 2`
    ///
    /// This is the cross-section through the approximate center of the mesh.
    #[default]
    CenterSlice,
    /// The minimum value along Z for each XY column
    ///
    /// This is the distance field of the mesh's silhouette along Z.
    MinProjection,
}

impl Reduction {
    /// Reduces a grid to an `R × R` layer, with X varying fastest
    pub fn apply(self, grid: &VoxelGrid) -> Vec<f32> {
        let r = grid.resolution();
        match self {
            Reduction::CenterSlice => grid.slice_z(r / 2).to_vec(),
            Reduction::MinProjection => {
                let mut out = vec![f32::INFINITY; r * r];
                for z in 0..r {
                    for (o, v) in out.iter_mut().zip(grid.slice_z(z)) {
                        *o = o.min(*v);
                    }
                }
                out
            }
        }
    }
}

/// Array of equally sized 2D single-channel `f32` layers
///
/// Layer `i` occupies `data[i * R² .. (i + 1) * R²]`, X varying fastest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atlas {
    resolution: usize,
    reduction: Reduction,
    address_mode: AddressMode,
    filter_mode: FilterMode,
    names: Vec<String>,
    bounds: Vec<Aabb>,
    data: Vec<f32>,
}

/// Packs independently generated fields into an atlas
///
/// Every field must have the given resolution; this is checked before any
/// output is allocated, and the whole atlas fails if one layer mismatches.
pub fn pack(
    fields: &[VoxelGrid],
    resolution: usize,
    reduction: Reduction,
) -> Result<Atlas, Error> {
    if resolution == 0 {
        return Err(Error::BadResolution(resolution));
    }
    if fields.is_empty() {
        return Err(Error::EmptyAtlas);
    }
    if let Some((layer, f)) = fields
        .iter()
        .enumerate()
        .find(|(_, f)| f.resolution() != resolution)
    {
        return Err(Error::ResolutionMismatch {
            layer,
            expected: resolution,
            actual: f.resolution(),
        });
    }

    let mut data = Vec::with_capacity(resolution * resolution * fields.len());
    for f in fields {
        data.extend(reduction.apply(f));
    }
    info!(
        "packed {} layers at {resolution}² with {reduction} reduction",
        fields.len()
    );
    Ok(Atlas {
        resolution,
        reduction,
        address_mode: AddressMode::ClampToEdge,
        filter_mode: FilterMode::Trilinear,
        names: fields.iter().map(|f| f.name().to_owned()).collect(),
        bounds: fields.iter().map(|f| *f.bounds()).collect(),
        data,
    })
}

impl Atlas {
    /// Width and height of each layer
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.names.len()
    }

    /// Texture size, as `[width, height, layers]`
    pub fn extents(&self) -> [usize; 3] {
        [self.resolution, self.resolution, self.layer_count()]
    }

    /// Reduction used to build every layer
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Addressing mode for out-of-range coordinates
    pub fn address_mode(&self) -> AddressMode {
        self.address_mode
    }

    /// Filtering mode between samples within a layer
    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Names of the source meshes, in layer order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Sampled region of the field behind each layer, in layer order
    pub fn bounds(&self) -> &[Aabb] {
        &self.bounds
    }

    /// Returns the data for a single layer
    pub fn layer(&self, i: usize) -> Option<&[f32]> {
        let n = self.resolution * self.resolution;
        self.data.get(i * n..(i + 1) * n)
    }

    /// Raw data for every layer
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

#[cfg(feature = "io")]
impl Atlas {
    /// Serializes the atlas (data and metadata) with `bincode`
    pub fn write<W: std::io::Write>(&self, out: W) -> Result<(), Error> {
        bincode::serialize_into(out, self)?;
        Ok(())
    }

    /// Deserializes an atlas written by [`Atlas::write`]
    ///
    /// Returns [`Error::CorruptData`] if the decoded layers do not match the
    /// decoded resolution and layer metadata.
    pub fn read<R: std::io::Read>(input: R) -> Result<Self, Error> {
        let a: Self = bincode::deserialize_from(input)?;
        let layers = a.names.len();
        if a.resolution == 0 || layers == 0 || a.bounds.len() != layers {
            return Err(Error::CorruptData(format!(
                "atlas has resolution {}, {layers} names and {} bounds",
                a.resolution,
                a.bounds.len()
            )));
        }
        let expected = crate::sdf::grid::sample_count(a.resolution, layers);
        if expected != Some(a.data.len()) {
            return Err(Error::CorruptData(format!(
                "atlas has {layers} layers at {}² but {} samples",
                a.resolution,
                a.data.len()
            )));
        }
        Ok(a)
    }

    /// Writes the bare layer data as little-endian `f32` values
    pub fn write_raw<W: std::io::Write>(
        &self,
        mut out: W,
    ) -> Result<(), Error> {
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
        sdf::{SdfConfig, generate},
    };
    use nalgebra::{Matrix4, Vector3};

    fn fields(resolutions: &[usize]) -> Vec<VoxelGrid> {
        resolutions
            .iter()
            .enumerate()
            .map(|(i, &resolution)| {
                let src = MeshSource::new(format!("cube{i}"), shapes::cube(1.0))
                    .with_transform(Matrix4::new_translation(&Vector3::new(
                        0.0,
                        0.0,
                        i as f32 * 0.1,
                    )));
                let cfg = SdfConfig {
                    resolution,
                    ..Default::default()
                };
                generate(&src, &cfg).unwrap()
            })
            .collect()
    }

    #[test]
    fn center_slices() {
        let f = fields(&[8, 8, 8]);
        let atlas = pack(&f, 8, Reduction::default()).unwrap();
        assert_eq!(atlas.reduction(), Reduction::CenterSlice);
        assert_eq!(atlas.extents(), [8, 8, 3]);
        assert_eq!(atlas.names(), ["cube0", "cube1", "cube2"]);
        for (i, f) in f.iter().enumerate() {
            assert_eq!(atlas.layer(i).unwrap(), f.slice_z(4));
            assert_eq!(atlas.bounds()[i], *f.bounds());
        }
        assert!(atlas.layer(3).is_none());
    }

    #[test]
    fn min_projection() {
        let f = fields(&[6]);
        let atlas = pack(&f, 6, Reduction::MinProjection).unwrap();
        let layer = atlas.layer(0).unwrap();
        for y in 0..6 {
            for x in 0..6 {
                let min = (0..6)
                    .map(|z| f[0].get(x, y, z).unwrap())
                    .fold(f32::INFINITY, f32::min);
                assert_eq!(layer[x + y * 6], min);
            }
        }
        assert_eq!(Reduction::MinProjection.to_string(), "min-projection");
    }

    #[test]
    fn resolution_mismatch() {
        let f = fields(&[8, 9]);
        let err = pack(&f, 8, Reduction::CenterSlice).err();
        assert!(matches!(
            err,
            Some(Error::ResolutionMismatch {
                layer: 1,
                expected: 8,
                actual: 9
            })
        ));
        assert!(matches!(
            pack(&[], 8, Reduction::CenterSlice),
            Err(Error::EmptyAtlas)
        ));
        assert!(matches!(
            pack(&f, 0, Reduction::CenterSlice),
            Err(Error::BadResolution(0))
        ));
    }

    #[cfg(feature = "io")]
    #[test]
    fn io() {
        let atlas = pack(&fields(&[4, 4]), 4, Reduction::CenterSlice).unwrap();
        let mut buf = vec![];
        atlas.write(&mut buf).unwrap();
        assert_eq!(Atlas::read(buf.as_slice()).unwrap(), atlas);

        let mut raw = vec![];
        atlas.write_raw(&mut raw).unwrap();
        assert_eq!(raw.len(), 4 * 4 * 4 * 2);
    }

    #[cfg(feature = "io")]
    #[test]
    fn corrupt_io() {
        let atlas = pack(&fields(&[4, 4]), 4, Reduction::CenterSlice).unwrap();
        let corrupt = |f: fn(&mut Atlas)| {
            let mut a = atlas.clone();
            f(&mut a);
            let mut buf = vec![];
            a.write(&mut buf).unwrap();
            Atlas::read(buf.as_slice()).err()
        };
        let cases: [fn(&mut Atlas); 5] = [
            |a: &mut Atlas| a.resolution = 5,
            |a: &mut Atlas| a.resolution = 0,
            |a: &mut Atlas| a.data.truncate(20),
            |a: &mut Atlas| a.names.push("extra".to_owned()),
            |a: &mut Atlas| {
                a.names.clear();
                a.bounds.clear();
                a.data.clear();
            },
        ];
        for (i, f) in cases.into_iter().enumerate() {
            assert!(
                matches!(corrupt(f), Some(Error::CorruptData(..))),
                "case {i} was accepted"
            );
        }
    }
}
