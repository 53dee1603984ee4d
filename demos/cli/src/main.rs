use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use nalgebra::{Matrix4, Vector3};
use strum::IntoEnumIterator;

use meshsdf::{
    atlas::{self, Atlas, Reduction},
    mesh::{Mesh, MeshSource, shapes},
    sdf::{self, Resolution, SdfConfig, ThreadPool, VoxelGrid},
    volume::Volume,
};

/// Converts triangle meshes into signed distance fields
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Mesh files to convert (binary or ASCII STL)
    #[clap(short, long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Built-in meshes to convert, after any input files
    #[clap(long, value_enum, num_args = 1..)]
    demo: Vec<Demo>,

    /// Number of samples along each axis
    #[clap(short, long)]
    resolution: usize,

    /// How to turn the inputs into fields
    #[clap(short, long, value_enum, default_value_t = Mode::Individual)]
    mode: Mode,

    /// Output directory
    #[clap(short, long)]
    out: PathBuf,

    /// Padding around each mesh, as a fraction of its bounding box diagonal
    #[clap(long, default_value_t = 0.1)]
    margin: f32,

    /// Number of threads to use
    #[clap(short, long)]
    threads: Option<NonZeroUsize>,

    /// Per-mesh translation, as `x,y,z` (one per mesh, in input order)
    #[clap(long, value_parser = parse_offset, num_args = 1..)]
    offset: Vec<Vector3<f32>>,

    /// Write a PNG of the central Z slice of every field (or atlas layer)
    #[clap(long)]
    preview: bool,

    /// Also write the bare little-endian `f32` payload next to each output
    #[clap(long)]
    raw: bool,

    /// Accept resolutions other than the standard presets
    #[clap(long)]
    any_resolution: bool,

    /// Reduction used to build atlas layers
    #[clap(long, value_enum, default_value_t = ReductionArg::CenterSlice)]
    reduction: ReductionArg,
}

#[derive(ValueEnum, Clone, Copy)]
enum Mode {
    /// One field per mesh
    Individual,
    /// A single field for all meshes
    Combined,
    /// One atlas layer per mesh
    Atlas,
}

#[derive(ValueEnum, Clone, Copy)]
enum Demo {
    Sphere,
    Cube,
}

#[derive(ValueEnum, Clone, Copy)]
enum ReductionArg {
    CenterSlice,
    MinProjection,
}

impl From<ReductionArg> for Reduction {
    fn from(r: ReductionArg) -> Self {
        match r {
            ReductionArg::CenterSlice => Reduction::CenterSlice,
            ReductionArg::MinProjection => Reduction::MinProjection,
        }
    }
}

fn parse_offset(s: &str) -> Result<Vector3<f32>> {
    let v = s
        .split(',')
        .map(|c| c.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid offset '{s}'"))?;
    match v.as_slice() {
        [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
        _ => bail!("offset '{s}' must have three components"),
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Returns `dir/<stem>.<ext>`, or `dir/<stem> N.<ext>` if that already exists
fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.{ext}"));
    let mut i = 1;
    while path.exists() {
        path = dir.join(format!("{stem} {i}.{ext}"));
        i += 1;
    }
    path
}

/// Writes a slice as a PNG: blue inside the mesh, orange outside
///
/// Brightness falls off with distance from the surface; +Y points up.
fn write_preview(path: &Path, slice: &[f32], resolution: usize) -> Result<()> {
    let scale = slice
        .iter()
        .map(|v| v.abs())
        .filter(|v| v.is_finite())
        .fold(f32::EPSILON, f32::max);
    let r = resolution as u32;
    let img = image::RgbImage::from_fn(r, r, |x, y| {
        let v = slice[x as usize + (r - 1 - y) as usize * resolution];
        let t = 1.0 - (v.abs() / scale).min(1.0) * 0.8;
        let [cr, cg, cb] = if v < 0.0 {
            [64.0, 140.0, 255.0]
        } else {
            [255.0, 160.0, 64.0]
        };
        image::Rgb([(cr * t) as u8, (cg * t) as u8, (cb * t) as u8])
    });
    img.save(path)?;
    info!("Wrote preview to {path:?}");
    Ok(())
}

struct Output<'a> {
    args: &'a Args,
}

impl Output<'_> {
    /// Saves a single field, returning the path of the main output file
    fn save_field(&self, grid: VoxelGrid) -> Result<PathBuf> {
        let args = self.args;
        let stem = format!("{}_SDF_{}", grid.name(), grid.resolution());
        let path = unique_path(&args.out, &stem, "sdf");
        let stem = file_stem(&path);
        if args.preview {
            let p = unique_path(&args.out, &stem, "png");
            let r = grid.resolution();
            write_preview(&p, grid.slice_z(r / 2), r)?;
        }
        let vol = Volume::from(grid);
        let mut f = BufWriter::new(File::create(&path)?);
        vol.write(&mut f)?;
        f.flush()?;
        if args.raw {
            let raw = unique_path(&args.out, &stem, "raw");
            vol.write_raw(BufWriter::new(File::create(raw)?))?;
        }
        Ok(path)
    }

    /// Saves an atlas, returning the path of the main output file
    fn save_atlas(&self, atlas: &Atlas) -> Result<PathBuf> {
        let args = self.args;
        let stem = format!("Atlas_SDF_{}", atlas.resolution());
        let path = unique_path(&args.out, &stem, "atlas");
        let stem = file_stem(&path);
        if args.preview {
            for (i, name) in atlas.names().iter().enumerate() {
                let layer_stem = format!("{stem}_{i}_{name}");
                let p = unique_path(&args.out, &layer_stem, "png");
                if let Some(layer) = atlas.layer(i) {
                    write_preview(&p, layer, atlas.resolution())?;
                }
            }
        }
        let mut f = BufWriter::new(File::create(&path)?);
        atlas.write(&mut f)?;
        f.flush()?;
        if args.raw {
            let raw = unique_path(&args.out, &stem, "raw");
            atlas.write_raw(BufWriter::new(File::create(raw)?))?;
        }
        Ok(path)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

////////////////////////////////////////////////////////////////////////////////

/// Loads every input, keeping per-mesh failures for reporting
fn load_inputs(args: &Args) -> Result<Vec<(String, Result<MeshSource>)>> {
    let mut out = vec![];
    for path in &args.input {
        let name = file_stem(path);
        let start = Instant::now();
        let mesh = File::open(path)
            .map_err(anyhow::Error::from)
            .and_then(|f| Ok(Mesh::read_stl(BufReader::new(f))?))
            .with_context(|| format!("could not read {path:?}"));
        if mesh.is_ok() {
            info!("Loaded {path:?} in {:?}", start.elapsed());
        }
        out.push((name.clone(), mesh.map(|m| MeshSource::new(name, m))));
    }
    for d in &args.demo {
        let (name, mesh) = match d {
            Demo::Sphere => ("sphere", shapes::icosphere(1.0, 4)),
            Demo::Cube => ("cube", shapes::cube(1.0)),
        };
        out.push((name.to_owned(), Ok(MeshSource::new(name, mesh))));
    }

    if !args.offset.is_empty() {
        if args.offset.len() != out.len() {
            return Err(meshsdf::Error::MismatchedTransforms {
                sources: out.len(),
                transforms: args.offset.len(),
            }
            .into());
        }
        for ((_, src), offset) in out.iter_mut().zip(&args.offset) {
            if let Ok(s) = src {
                s.transform = Matrix4::new_translation(offset) * s.transform;
            }
        }
    }
    Ok(out)
}

/// Runs the requested mode, returning `true` if everything succeeded
fn run(args: &Args, cfg: &SdfConfig) -> Result<bool> {
    let inputs = load_inputs(args)?;
    let output = Output { args };
    let mut ok = true;

    let mut sources = vec![];
    for (name, src) in inputs {
        match src {
            Ok(s) => sources.push(s),
            Err(e) => {
                println!("'{name}': {e:#}");
                ok = false;
            }
        }
    }

    match args.mode {
        Mode::Individual => {
            let report = sdf::generate_batch(&sources, cfg);
            ok &= report.is_success();
            for item in report.items {
                let saved = item
                    .result
                    .map_err(anyhow::Error::from)
                    .and_then(|grid| output.save_field(grid));
                match saved {
                    Ok(path) => println!(
                        "SDF for '{}' saved at: {}",
                        item.name,
                        path.display()
                    ),
                    Err(e) => {
                        println!("'{}': {e:#}", item.name);
                        ok = false;
                    }
                }
            }
        }
        Mode::Combined => {
            if !ok {
                bail!("combined field needs every input to load");
            }
            let grid = sdf::generate_combined(&sources, cfg)?;
            let name = grid.name().to_owned();
            let path = output.save_field(grid)?;
            println!("SDF for '{name}' saved at: {}", path.display());
        }
        Mode::Atlas => {
            let report = sdf::generate_batch(&sources, cfg);
            for (name, e) in report.failures() {
                println!("'{name}': {e}");
            }
            if !ok || !report.is_success() {
                bail!("atlas needs every layer to succeed");
            }
            let fields: Vec<VoxelGrid> = report
                .items
                .into_iter()
                .filter_map(|i| i.result.ok())
                .collect();
            let reduction = args.reduction.into();
            let atlas = atlas::pack(&fields, args.resolution, reduction)?;
            for (i, name) in atlas.names().iter().enumerate() {
                println!("layer {i}: '{name}'");
            }
            let path = output.save_atlas(&atlas)?;
            println!("atlas saved at: {}", path.display());
        }
    }
    Ok(ok)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();

    let args = Args::parse();
    if args.input.is_empty() && args.demo.is_empty() {
        bail!("no meshes given; use --input or --demo");
    }
    if !args.any_resolution && Resolution::from_size(args.resolution).is_none()
    {
        let presets: Vec<String> =
            Resolution::iter().map(|r| r.to_string()).collect();
        bail!(
            "resolution {} is not one of {}; pass --any-resolution to use it",
            args.resolution,
            presets.join(", ")
        );
    }
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("could not create {:?}", args.out))?;

    let pool = match args.threads {
        Some(n) if n.get() > 1 => ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n.get())
                .build()?,
        ),
        _ => ThreadPool::Global,
    };
    let cfg = SdfConfig {
        resolution: args.resolution,
        margin: args.margin,
        threads: match args.threads {
            Some(n) if n.get() == 1 => None,
            _ => Some(&pool),
        },
        ..Default::default()
    };

    let start = Instant::now();
    let ok = run(&args, &cfg)?;
    info!("Finished in {:?}", start.elapsed());
    if !ok {
        bail!("some meshes failed");
    }
    Ok(())
}
