//! Traversal Benchmarks
//!
//! Measures cursor traversal and one-by-one insertion over the in-memory store.
//! Run with: cargo bench

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use tokio::runtime::Runtime;

use weibo_ingestion::cursor::{traverse_with_step, CollectionScan, StepVisitor};
use weibo_ingestion::insert::insert_records;
use weibo_ingestion::schemas::User;
use weibo_ingestion::store::{Collection, Document, MemoryStore};

const RECORDS: u64 = 10_000;

struct Count(u64);

#[async_trait]
impl StepVisitor for Count {
    async fn visit(&mut self, record: Document) -> weibo_ingestion::Result<ControlFlow<()>> {
        black_box(record);
        self.0 += 1;
        Ok(ControlFlow::Continue(()))
    }
}

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.seed(
        Collection::Statuses,
        (0..RECORDS as i64).map(|id| json!({ "id": id, "comments_count": id % 7, "text": "status" })),
    );
    store
}

/// Benchmark traversal with different step sizes
fn bench_traversal_steps(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = seeded_store();

    let mut group = c.benchmark_group("traversal_steps");
    group.throughput(Throughput::Elements(RECORDS));

    for step in [10usize, 100, 1000] {
        group.bench_function(format!("step_{}", step), |b| {
            b.to_async(&rt).iter(|| async {
                let scan = CollectionScan::new(&store, Collection::Statuses).project(&["id", "comments_count"]);
                let mut visitor = Count(0);
                let step = NonZeroUsize::new(step).unwrap();
                traverse_with_step(&scan, step, &mut visitor).await.unwrap();
                black_box(visitor.0)
            })
        });
    }

    group.finish();
}

/// Benchmark one-by-one inserts with half of the batch already stored
fn bench_insert_with_duplicates(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("insert_one_by_one");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("half_duplicates", |b| {
        b.to_async(&rt).iter(|| async {
            let store = MemoryStore::new();
            store.seed(Collection::Users, (0..500).map(|id| json!({ "id": id })));
            let users = (0..1000).map(User::new).collect();
            black_box(insert_records(&store, users).await.unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_traversal_steps, bench_insert_with_duplicates);

criterion_main!(benches);
