//! Kernel benchmarks for tactics_core.
//!
//! Run with: `cargo bench -p tactics_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tactics_core::ai::think;
use tactics_core::battlefield::Battlefield;
use tactics_core::data::{DamageKind, PartSlot};
use tactics_core::explosion::{blast_footprint, explode, Explosion};
use tactics_core::fov::{calculate_all_fov, visible_tiles};
use tactics_core::geometry::Position;
use tactics_core::pathfinding::{PathOptions, Pathfinding};
use tactics_test_utils::fixtures::{alien, open_ground, soldier};

/// A square field crossed by staggered walls with gaps.
fn obstacle_course(size: i32) -> Battlefield {
    let (mut bf, parts) = open_ground(size, size);
    for x in (4..size).step_by(4) {
        let gap = (x * 7) % size;
        for y in 0..size {
            if (y - gap).abs() > 1 {
                bf.grid
                    .set_part(Position::new(x, y, 0), PartSlot::WestWall, Some(parts.west_wall))
                    .expect("in bounds");
            }
        }
    }
    bf
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pathfinding");
    for size in [20, 40, 60] {
        let mut bf = obstacle_course(size);
        let id = bf.add_unit(soldier("runner", Position::new(0, 0, 0))).expect("free");
        let unit = bf.unit(id).expect("added").clone();
        let goal = Position::new(size - 1, size - 1, 0);
        let mut pathfinding = Pathfinding::new();

        group.bench_with_input(BenchmarkId::new("calculate_path", size), &size, |b, _| {
            b.iter(|| pathfinding.calculate_path(black_box(&bf), &unit, goal, PathOptions::default()))
        });
        group.bench_with_input(BenchmarkId::new("find_reachable", size), &size, |b, _| {
            b.iter(|| pathfinding.find_reachable(black_box(&bf), &unit, 60, PathOptions::default()))
        });
    }
    group.finish();
}

pub fn visibility_benchmark(c: &mut Criterion) {
    let mut bf = obstacle_course(40);
    for i in 0..6 {
        bf.add_unit(soldier(&format!("s{i}"), Position::new(2 + i * 6, 3, 0))).expect("free");
        bf.add_unit(alien(&format!("a{i}"), Position::new(2 + i * 6, 30, 0))).expect("free");
    }
    let observer = bf.units()[0].clone();

    c.bench_function("visible_tiles", |b| b.iter(|| visible_tiles(black_box(&bf), &observer)));
    c.bench_function("calculate_all_fov", |b| {
        b.iter_batched(
            || bf.clone(),
            |mut field| calculate_all_fov(&mut field),
            criterion::BatchSize::LargeInput,
        )
    });
}

pub fn explosion_benchmark(c: &mut Criterion) {
    let bf = obstacle_course(40);
    let mut group = c.benchmark_group("explosion");
    for radius in [3, 6, 12] {
        let blast = Explosion::at_tile(Position::new(20, 20, 0), 150, DamageKind::HighExplosive, radius);
        group.bench_with_input(BenchmarkId::new("footprint", radius), &radius, |b, _| {
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            b.iter(|| blast_footprint(&bf.grid, &bf.config.explosion, black_box(&blast), &mut rng))
        });
    }
    group.finish();

    let blast = Explosion::at_tile(Position::new(20, 20, 0), 150, DamageKind::HighExplosive, 6);
    c.bench_function("explode", |b| {
        b.iter_batched(
            || (bf.clone(), ChaCha8Rng::seed_from_u64(2)),
            |(mut field, mut rng)| explode(&mut field, &blast, &mut rng),
            criterion::BatchSize::LargeInput,
        )
    });
}

pub fn ai_benchmark(c: &mut Criterion) {
    let mut bf = obstacle_course(30);
    let thinker = bf.add_unit(alien("thinker", Position::new(10, 10, 0))).expect("free");
    bf.add_unit(soldier("s1", Position::new(18, 12, 0))).expect("free");
    bf.add_unit(soldier("s2", Position::new(6, 20, 0))).expect("free");
    calculate_all_fov(&mut bf).expect("units exist");

    c.bench_function("think", |b| {
        b.iter_batched(
            || (bf.clone(), ChaCha8Rng::seed_from_u64(3)),
            |(mut field, mut rng)| think(&mut field, thinker, &mut rng),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    pathfinding_benchmark,
    visibility_benchmark,
    explosion_benchmark,
    ai_benchmark
);
criterion_main!(benches);
