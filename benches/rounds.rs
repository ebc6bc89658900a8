use criterion::{criterion_group, criterion_main, Criterion};
use lockstep::protocols::{BrachaPeer, CoolPeer};
use lockstep::{run_sync, Combination, RunConfig, Strategy};

fn honest_config(n: usize, f: usize, sites: usize) -> RunConfig {
    RunConfig {
        n,
        f,
        sender: 0,
        byzantine_nodes: vec![0; n],
        group_0: Vec::new(),
        group_1: Vec::new(),
        combination: Combination::Vector(vec![Strategy::Same; sites]),
        sender_value: 1,
        percentage: 0.0,
        max_rounds: 20,
        seed: None,
        debug_prints: false,
    }
}

fn bench_full_runs(c: &mut Criterion) {
    // Benchmarks complete honest runs: every phase of the protocol, the
    // substrate rotations, and the driver overhead.

    let mut group = c.benchmark_group("Full runs");

    let bracha = honest_config(25, 8, 2);
    group.bench_function("bracha, 25 nodes, honest sender", |b| {
        b.iter(|| {
            let report = run_sync::<BrachaPeer>(&bracha).unwrap();
            assert!(report.all_honest_delivered(1));
        })
    });

    let cool = honest_config(25, 8, 6);
    group.bench_function("cool, 25 nodes, honest sender", |b| {
        b.iter(|| {
            let report = run_sync::<CoolPeer>(&cool).unwrap();
            assert!(report.all_honest_delivered(1));
        })
    });

    group.finish()
}

criterion_group!(benches, bench_full_runs);
criterion_main!(benches);
