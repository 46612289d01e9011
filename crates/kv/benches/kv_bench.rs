//! Benchmarks for the coordinator: quorum point ops and merged range scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use partkv_common::{Cell, RangeRequest};
use partkv_kv::memory::InMemReplicaClient;
use partkv_kv::placement::StaticPartitionMap;
use partkv_kv::{FanOutExecutor, KvCoordinator, NodeInfo, QuorumConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::time::Duration;

fn cluster(rt: &Runtime, nodes: usize, splits: &[&str]) -> (KvCoordinator<InMemReplicaClient>, Arc<InMemReplicaClient>) {
    rt.block_on(async {
        let client = Arc::new(InMemReplicaClient::default());
        let ring: Vec<NodeInfo> = (0..nodes)
            .map(|i| NodeInfo::from_name(format!("bench_{}", i)))
            .collect();
        for node in &ring {
            client.add_node(node).await;
        }
        let splits = splits.iter().map(|s| s.as_bytes().to_vec()).collect();
        let map = StaticPartitionMap::new(ring, splits, 3, client.clone()).unwrap();
        let quorum = QuorumConfig {
            n: 3,
            r: 2,
            w: 2,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        };
        let kv = KvCoordinator::new(Arc::new(map), client.clone(), FanOutExecutor::new(64), quorum);
        kv.create_table("bench", 1 << 20).await.unwrap();
        (kv, client)
    })
}

// ────────────────────────── Point operations ──────────────────────────

fn bench_coordinator_put(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (kv, _client) = cluster(&rt, 3, &[]);

    c.bench_function("coordinator_put", |b| {
        let mut i = 0u64;
        b.iter(|| {
            rt.block_on(async {
                let mut cells = BTreeMap::new();
                cells.insert(Cell::new(format!("key_{}", i), "c"), b"value".to_vec());
                kv.put("bench", &cells, i).await.unwrap();
            });
            i += 1;
        });
    });
}

fn bench_coordinator_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (kv, _client) = cluster(&rt, 3, &[]);

    rt.block_on(async {
        let mut cells = BTreeMap::new();
        for i in 0..1000 {
            cells.insert(Cell::new(format!("key_{:04}", i), "c"), b"value".to_vec());
        }
        kv.put("bench", &cells, 1).await.unwrap();
    });

    c.bench_function("coordinator_get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            rt.block_on(async {
                let mut want = BTreeMap::new();
                want.insert(Cell::new(format!("key_{:04}", i % 1000), "c"), 10);
                black_box(kv.get("bench", &want).await.unwrap());
            });
            i += 1;
        });
    });
}

// ────────────────────────── Range scans ──────────────────────────

fn bench_range_scan(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("range_scan");

    for rows in [100usize, 1_000, 10_000] {
        let (kv, _client) = cluster(&rt, 5, &["key_03", "key_06"]);
        rt.block_on(async {
            let mut cells = BTreeMap::new();
            for i in 0..rows {
                let row = format!("key_{:08}", i * 1_000_000 / rows);
                cells.insert(Cell::new(row.clone(), "a"), b"x".to_vec());
                cells.insert(Cell::new(row, "b"), b"y".to_vec());
            }
            kv.put("bench", &cells, 1).await.unwrap();
        });

        group.bench_with_input(BenchmarkId::new("forward", rows), &rows, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let scan = kv.get_range("bench", RangeRequest::all(), 1).await.unwrap();
                    black_box(scan.collect_rows().await.unwrap());
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("reversed", rows), &rows, |b, _| {
            let range = RangeRequest::builder().reversed().build().unwrap();
            b.iter(|| {
                rt.block_on(async {
                    let scan = kv.get_range("bench", range.clone(), 1).await.unwrap();
                    black_box(scan.collect_rows().await.unwrap());
                });
            });
        });
    }
    group.finish();
}

fn bench_range_first_row(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (kv, _client) = cluster(&rt, 3, &[]);
    rt.block_on(async {
        let mut cells = BTreeMap::new();
        for i in 0..10_000 {
            cells.insert(Cell::new(format!("key_{:05}", i), "c"), b"v".to_vec());
        }
        kv.put("bench", &cells, 1).await.unwrap();
    });

    c.bench_function("range_first_row_then_close", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut scan = kv.get_range("bench", RangeRequest::all(), 1).await.unwrap();
                black_box(scan.next_row().await.unwrap());
                scan.close();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_coordinator_put,
    bench_coordinator_get,
    bench_range_scan,
    bench_range_first_row,
);
criterion_main!(benches);
