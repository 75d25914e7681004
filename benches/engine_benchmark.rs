//! Benchmarks for the dynamics engine.
//!
//! Covers the infinite-horizon projection and complete sequences driven by
//! simulated players, the hot path of `dyncpr batch`.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use dyncpr::engine::VirtualClock;
use dyncpr::model::{HorizonInputs, project};
use dyncpr::part::{NullDisplay, NullSink, SimulatedPlayers};
use dyncpr::{CprPart, DynamicRegime, GameConfig, PayoffModel};

fn bench_projection(c: &mut Criterion) {
    let config = GameConfig::default();
    let model = PayoffModel::from_config(&config);

    // Stock above the break-even level and declining: the longest path.
    let inputs = HorizonInputs {
        own_extraction: 20.0,
        group_extraction: 40.0,
        stock: 500.0,
    };

    c.bench_function("projection_above_declining", |b| {
        b.iter(|| black_box(project(black_box(&model), config.growth, black_box(inputs))));
    });
}

fn bench_discrete_sequence(c: &mut Criterion) {
    let config = GameConfig {
        regime: DynamicRegime::Discrete,
        ..GameConfig::default()
    };
    let players: Vec<u32> = (1..=8).collect();

    c.bench_function("discrete_sequence_8p", |b| {
        b.iter(|| {
            let mut source = SimulatedPlayers::new(&config, black_box(42));
            let mut part = CprPart::new(config.clone(), players.clone(), NullSink, NullDisplay).unwrap();
            let report = part
                .run(&mut source, &mut VirtualClock::new(config.tick_interval()))
                .unwrap();
            black_box(report)
        });
    });
}

fn bench_continuous_sequence(c: &mut Criterion) {
    let config = GameConfig {
        regime: DynamicRegime::Continuous,
        ..GameConfig::default()
    };
    let players: Vec<u32> = (1..=8).collect();

    c.bench_function("continuous_sequence_8p", |b| {
        b.iter(|| {
            let mut source = SimulatedPlayers::new(&config, black_box(42));
            let mut part = CprPart::new(config.clone(), players.clone(), NullSink, NullDisplay).unwrap();
            let report = part
                .run(&mut source, &mut VirtualClock::new(config.tick_interval()))
                .unwrap();
            black_box(report)
        });
    });
}

criterion_group!(
    benches,
    bench_projection,
    bench_discrete_sequence,
    bench_continuous_sequence
);
criterion_main!(benches);
