//! Types used in configuration structures
use crate::{mesh::IngestSettings, types::Aabb};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use strum::IntoEnumIterator;

/// Worker pool that fills Z-slabs of the grid (and batch items) in parallel
///
/// Generation calls borrow the pool through [`SdfConfig::threads`], so one
/// dedicated pool can be shared by many generations; otherwise the global
/// Rayon pool is used.
pub enum ThreadPool {
    /// Dedicated pool, e.g. one sized for a benchmark or a tool setting
    Custom(rayon::ThreadPool),
    /// Rayon's global pool
    Global,
}

impl ThreadPool {
    /// Runs a closure with this pool as the current Rayon pool
    ///
    /// Parallel iterators inside `f` are scheduled on this pool.
    pub fn run<F: FnOnce() -> V + Send, V: Send>(&self, f: F) -> V {
        match self {
            ThreadPool::Custom(p) => p.install(f),
            ThreadPool::Global => f(),
        }
    }

    /// Number of workers that can sample slabs concurrently
    pub fn thread_count(&self) -> usize {
        match self {
            ThreadPool::Custom(p) => p.current_num_threads(),
            ThreadPool::Global => rayon::current_num_threads(),
        }
    }
}

/// Shared flag that aborts an in-progress generation
///
/// Workers check the token before starting each Z-slab.  A cancelled
/// generation returns [`Error::Cancelled`](crate::Error::Cancelled) and never
/// a partially filled grid; slabs already in flight finish first.  Clones
/// share the same flag, so a token can be cancelled from another thread.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Builds a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that every generation using this token stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Preset grid resolutions offered by interactive tools
///
/// The generator accepts any positive resolution; these are only the sizes
/// that front-ends are expected to offer.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, strum::EnumIter, strum::Display,
)]
#[allow(missing_docs)]
pub enum Resolution {
    #[strum(to_string = "16")]
    R16,
    #[strum(to_string = "32")]
    R32,
    #[strum(to_string = "64")]
    R64,
    #[strum(to_string = "96")]
    R96,
    #[strum(to_string = "128")]
    R128,
    #[strum(to_string = "160")]
    R160,
    #[strum(to_string = "200")]
    R200,
    #[strum(to_string = "256")]
    R256,
}

impl Resolution {
    /// Returns the number of voxels along each axis
    pub fn size(self) -> usize {
        match self {
            Resolution::R16 => 16,
            Resolution::R32 => 32,
            Resolution::R64 => 64,
            Resolution::R96 => 96,
            Resolution::R128 => 128,
            Resolution::R160 => 160,
            Resolution::R200 => 200,
            Resolution::R256 => 256,
        }
    }

    /// Looks up the preset with the given size
    pub fn from_size(size: usize) -> Option<Self> {
        Self::iter().find(|r| r.size() == size)
    }
}

impl From<Resolution> for usize {
    fn from(r: Resolution) -> usize {
        r.size()
    }
}

/// Settings for distance field generation
pub struct SdfConfig<'a> {
    /// Number of samples along each axis of the grid
    pub resolution: usize,

    /// Padding around the mesh, as a fraction of its bounding box diagonal
    ///
    /// The padding is added on every side of the box.  Ignored if
    /// [`bounds`](Self::bounds) is set.
    pub margin: f32,

    /// Explicit sampling region, overriding the mesh bounds and margin
    pub bounds: Option<Aabb>,

    /// Validation settings used when building the triangle soup
    pub ingest: IngestSettings,

    /// Thread pool to use for generation
    ///
    /// If this is `None`, then generation is done in a single thread;
    /// otherwise, the provided pool is used.
    pub threads: Option<&'a ThreadPool>,

    /// Token to cancel generation
    pub cancel: CancelToken,
}

impl Default for SdfConfig<'_> {
    fn default() -> Self {
        Self {
            resolution: Resolution::R32.size(),
            margin: 0.1,
            bounds: None,
            ingest: IngestSettings::default(),
            threads: Some(&ThreadPool::Global),
            cancel: CancelToken::new(),
        }
    }
}

impl SdfConfig<'_> {
    /// Returns the number of threads that generation will use
    pub fn thread_count(&self) -> usize {
        self.threads.map(|t| t.thread_count()).unwrap_or(1)
    }

    /// Returns the sampling region for a mesh with the given bounds
    pub(crate) fn sample_bounds(&self, mesh: &Aabb) -> Aabb {
        self.bounds
            .unwrap_or_else(|| mesh.expanded(mesh.diagonal() * self.margin))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn resolution_presets() {
        let sizes: Vec<usize> = Resolution::iter().map(usize::from).collect();
        assert_eq!(sizes, [16, 32, 64, 96, 128, 160, 200, 256]);
        for r in Resolution::iter() {
            assert_eq!(r.to_string(), r.size().to_string());
            assert_eq!(Resolution::from_size(r.size()), Some(r));
        }
        assert_eq!(Resolution::from_size(33), None);
    }

    #[test]
    fn margin() {
        let mesh =
            Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 4.0, 0.0));
        let cfg = SdfConfig {
            margin: 0.2,
            ..Default::default()
        };
        let b = cfg.sample_bounds(&mesh);
        assert_eq!(b.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, Point3::new(4.0, 5.0, 1.0));

        let fixed = Aabb::new(
            Point3::new(-2.0, -2.0, -2.0),
            Point3::new(2.0, 2.0, 2.0),
        );
        let cfg = SdfConfig {
            bounds: Some(fixed),
            ..cfg
        };
        assert_eq!(cfg.sample_bounds(&mesh), fixed);
    }

    #[test]
    fn cancel_token() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
