//! Performance benchmarks for topology parsing and target selection
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipcbench::selection::{expand, select};
use ipcbench::topology::{bitmap, CacheLevels, CpuInfo, NodeInfo, SharedCacheLevel, TopologyTable};
use std::collections::BTreeSet;

/// `sockets` sockets of `cores` cores with two hyperthreads each, one node
/// per socket. Thread `t` of core `c` on socket `s` is CPU
/// `t * sockets * cores + s * cores + c`, the usual Linux enumeration.
fn synthetic_machine(sockets: usize, cores: usize) -> (TopologyTable, CacheLevels) {
    let per_thread = sockets * cores;
    let mut cpus = Vec::with_capacity(per_thread * 2);
    let mut levels = Vec::with_capacity(per_thread * 2);

    for id in 0..per_thread * 2 {
        let core = id % per_thread;
        let socket = core / cores;
        cpus.push(CpuInfo {
            id,
            socket,
            node: socket,
            siblings: BTreeSet::from([core, core + per_thread]),
        });

        let level = if core == 0 {
            SharedCacheLevel::Level(if id == 0 { 1 } else { 2 })
        } else if socket == 0 {
            SharedCacheLevel::Level(3)
        } else {
            SharedCacheLevel::Memory
        };
        levels.push(level);
    }

    let nodes = (0..sockets)
        .map(|node| NodeInfo {
            id: node,
            cpus: cpus.iter().filter(|c| c.node == node).map(|c| c.id).collect(),
            memory: None,
        })
        .collect();

    let table = TopologyTable::new(cpus, nodes).unwrap();
    (table, CacheLevels::from_levels(levels))
}

fn bench_bitmap_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitmap_parse");

    for count in [64usize, 1024, 8192].iter() {
        // Every other CPU, so nothing collapses into a single range
        let list = bitmap::format((0..*count).step_by(2).collect::<BTreeSet<_>>().iter());
        group.throughput(Throughput::Bytes(list.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &list, |b, list| {
            b.iter(|| bitmap::parse(black_box(list)).unwrap());
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for (sockets, cores) in [(2usize, 8usize), (4, 32), (8, 64)].iter() {
        let (table, cache) = synthetic_machine(*sockets, *cores);
        group.throughput(Throughput::Elements(table.cpu_count() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(table.cpu_count()),
            &(table, cache),
            |b, (table, cache)| {
                b.iter(|| select(black_box(table), black_box(cache)));
            },
        );
    }

    group.finish();
}

fn bench_select_and_expand(c: &mut Criterion) {
    let (table, cache) = synthetic_machine(8, 64);

    c.bench_function("select_and_expand_1024_cpus", |b| {
        b.iter(|| {
            let targets = select(black_box(&table), black_box(&cache));
            black_box(expand(&table, &targets))
        });
    });
}

criterion_group!(benches, bench_bitmap_parse, bench_select, bench_select_and_expand);
criterion_main!(benches);
