use criterion::{
    BenchmarkId, Criterion, black_box, criterion_group, criterion_main,
};
use meshsdf::{
    bvh::{Bvh, NearestQuery},
    mesh::{IngestSettings, MeshSource, Soup, shapes},
    sdf::{SdfConfig, ThreadPool},
};
use nalgebra::Point3;

pub fn sphere_thread_sweep(c: &mut Criterion) {
    let sphere = &MeshSource::new("sphere", shapes::icosphere(1.0, 5));

    let mut group =
        c.benchmark_group("speed vs threads (sphere, 20480 triangles) (64³)");
    for threads in [1, 2, 4, 8] {
        let pool = ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap(),
        );
        let cfg = &SdfConfig {
            resolution: 64,
            threads: Some(&pool),
            ..Default::default()
        };
        group.bench_function(BenchmarkId::new("generate", threads), |b| {
            b.iter(|| black_box(meshsdf::sdf::generate(sphere, cfg).unwrap()))
        });
    }
}

pub fn bvh_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("BVH build");
    for subdivisions in [3, 5, 6, 7] {
        let mesh = shapes::icosphere(1.0, subdivisions);
        let src = MeshSource::new("sphere", mesh);
        let soup = Soup::new(&src, &IngestSettings::default()).unwrap();
        let tris = soup.triangles();
        group.bench_function(BenchmarkId::new("sah", soup.len()), |b| {
            b.iter(|| black_box(Bvh::build(tris)))
        });
    }
}

pub fn bvh_nearest(c: &mut Criterion) {
    let src = MeshSource::new("sphere", shapes::icosphere(1.0, 5));
    let soup = Soup::new(&src, &IngestSettings::default()).unwrap();
    let tris = soup.triangles();
    let bvh = Bvh::build(tris);
    let points: Vec<Point3<f32>> = (0..1000)
        .map(|i| {
            let t = i as f32 / 1000.0 * std::f32::consts::TAU;
            Point3::new(t.cos() * 1.5, t.sin() * 0.5, (t * 3.0).sin())
        })
        .collect();

    let mut group = c.benchmark_group("BVH nearest (1000 points)");
    for hint in [false, true] {
        group.bench_function(BenchmarkId::new("hint", hint), |b| {
            let mut query = NearestQuery::default();
            b.iter(|| {
                let mut prev = None;
                for p in &points {
                    let n =
                        bvh.nearest_with(&mut query, tris, p, prev).unwrap();
                    if hint {
                        prev = Some(n.triangle);
                    }
                    black_box(n);
                }
            })
        });
    }
}

criterion_group!(benches, sphere_thread_sweep, bvh_build, bvh_nearest);
criterion_main!(benches);
