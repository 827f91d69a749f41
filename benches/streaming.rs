use criterion::{criterion_group, criterion_main, Criterion, black_box};

use pointstream::core::ViewState;
use pointstream::octree::OctreeBuilder;
use pointstream::point::Pos64IShort;
use pointstream::store::StoreWriter;
use pointstream::store::PagedStoreReader;
use pointstream::streaming::{ChunkSettings, StreamingConfig, chunk_points, select_nodes};

use glam::DVec3;

/// Points on a wavy surface, roughly like a terrain scan
fn create_test_surface(side: usize) -> Vec<Pos64IShort> {
    let mut points = Vec::with_capacity(side * side);
    for x in 0..side {
        for z in 0..side {
            let (fx, fz) = (x as f64 * 0.1, z as f64 * 0.1);
            let y = (fx * 0.3).sin() * 4.0 + (fz * 0.2).cos() * 3.0;
            points.push(Pos64IShort::new(DVec3::new(fx, y, fz), ((x * 7 + z * 13) % 4096) as u16));
        }
    }
    points
}

fn bench_octree_build_100k(c: &mut Criterion) {
    let points = create_test_surface(316);

    c.bench_function("octree_build_100k", |b| {
        b.iter(|| {
            let builder = OctreeBuilder::with_capacity(black_box(5_000));
            builder.build(black_box(points.clone()))
        });
    });
}

fn bench_chunk_points(c: &mut Criterion) {
    let points = create_test_surface(400);
    let settings = ChunkSettings::default();

    c.bench_function("chunk_points_160k", |b| {
        b.iter(|| chunk_points(black_box(&points), black_box(&settings)));
    });
}

fn bench_select_nodes(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let tree = OctreeBuilder::with_capacity(2_000)
        .build(create_test_surface(500))
        .expect("build");
    StoreWriter::default().write(&tree, dir.path()).expect("write");
    let reader = PagedStoreReader::<Pos64IShort>::open(dir.path()).expect("open");

    let view = ViewState::look_at(
        DVec3::new(25.0, 30.0, -20.0),
        DVec3::new(25.0, 0.0, 25.0),
        60.0,
        1920,
        1080,
    );
    let config = StreamingConfig {
        point_budget: 100_000,
        ..Default::default()
    };

    c.bench_function("select_nodes_250k", |b| {
        b.iter(|| select_nodes(black_box(reader.index()), black_box(&view), black_box(&config)));
    });
}

criterion_group!(
    benches,
    bench_octree_build_100k,
    bench_chunk_points,
    bench_select_nodes,
);
criterion_main!(benches);
