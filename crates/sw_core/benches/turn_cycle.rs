//! Turn cycle benchmarks for sw_core.
//!
//! Run with: `cargo bench -p sw_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sw_core::follow::NoFollow;
use sw_core::game::MatchConfig;
use sw_test_utils::fixtures::{started_match, started_turns};
use sw_test_utils::script::autoplay_round;

/// Bare orchestrator: end movement, end turn, dispatch next.
pub fn turn_dispatch_benchmark(c: &mut Criterion) {
    c.bench_function("dispatch_100_turns_4v4", |b| {
        b.iter(|| {
            let (mut actors, mut turns) = started_turns(&[4, 4]);
            for _ in 0..100 {
                turns.end_movement_phase();
                black_box(turns.end_current_turn(&mut actors, &NoFollow));
            }
            turns.turn_number()
        });
    });
}

/// Full automated rounds through the match runtime.
pub fn autoplay_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("autoplay_round");
    for units in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(units), &units, |b, &units| {
            b.iter(|| {
                let mut game =
                    started_match(&[units, units], &["gun", "grenade"], MatchConfig::seeded(7));
                black_box(autoplay_round(&mut game, 100_000))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, turn_dispatch_benchmark, autoplay_benchmark);
criterion_main!(benches);
