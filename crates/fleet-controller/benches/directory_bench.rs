// Criterion benchmarks for fleet-controller
//
// Run benchmarks with:
//   cargo bench -p fleet-controller

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_common::Replica;
use fleet_controller::{ClusterState, PortAllocator, PortRange};

fn populated_state(nodes: usize, per_node: usize) -> ClusterState {
    let mut state = ClusterState::new();
    for n in 0..nodes {
        let node = format!("http://10.0.0.{}:9000", n);
        state.register_node(node.clone());
        for i in 0..per_node {
            let replica = Replica::running(format!("r-{}-{}", n, i), node.clone(), 8000 + i as u16);
            let _ = state.add_replica(replica);
        }
    }
    state
}

fn bench_port_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("port_allocation");

    for per_node in [0usize, 10, 100] {
        let state = populated_state(5, per_node);
        group.bench_with_input(BenchmarkId::new("allocate", per_node), &state, |b, state| {
            b.iter(|| {
                let mut ports = PortAllocator::from_state(PortRange::default(), state);
                black_box(ports.allocate("http://10.0.0.0:9000"))
            });
        });
    }

    group.finish();
}

fn bench_directory_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_queries");
    let state = populated_state(10, 50);

    group.bench_function("count_actual", |b| {
        b.iter(|| black_box(state.count_actual()));
    });

    group.bench_function("running_replicas", |b| {
        b.iter(|| black_box(state.running_replicas()));
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(state.snapshot()));
    });

    group.finish();
}

criterion_group!(benches, bench_port_allocation, bench_directory_queries);
criterion_main!(benches);
