use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rusty_kdtree::distributed::DistributedKdTreeBuilder;
use rusty_kdtree::helpers::random_points;
use rusty_kdtree::serial;
use rusty_kdtree::transport::{local, Transport};
use rusty_kdtree::types::point::PointSet;

const NPOINTS: usize = 100000;
const DIMS: usize = 3;

fn benchmark_serial_build(c: &mut Criterion) {
    let points = random_points(NPOINTS, DIMS, 1 << 20, 0);

    c.bench_function("serial build", |b| {
        b.iter(|| {
            let points = PointSet::new(points.clone(), DIMS).unwrap();
            serial::build(black_box(points), 0)
        })
    });
}

fn benchmark_local_group_build(c: &mut Criterion) {
    let points = random_points(NPOINTS, DIMS, 1 << 20, 0);

    for &size in [2, 4, 5].iter() {
        c.bench_function(&format!("in-process build, {size} workers"), |b| {
            b.iter(|| {
                local::run(size, |transport| {
                    let builder = DistributedKdTreeBuilder::new(&transport, DIMS).unwrap();
                    let points: &[_] = if transport.rank() == 0 { &points } else { &[] };
                    builder.build(black_box(points)).unwrap()
                })
            })
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = benchmark_serial_build,
              benchmark_local_group_build,
}
criterion_main!(benches);
