//! Performance benchmarks for the hash table family
//!
//! Run with: cargo bench
//!
//! These measure the characteristics the family was shaped by:
//! - Insert throughput from a cold table (amortized growth included)
//! - Fetch throughput at a realistic load factor
//! - Delete/reinsert churn, which stresses the backward-shift path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use argent::hash::{NameHashTable, PtrHashTable};

fn bench_ptr_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("ptr_insert");
    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut table = PtrHashTable::new();
                for i in 0..size {
                    table.insert(black_box(i * 16 + 8), i as u64);
                }
                black_box(table.len())
            })
        });
    }
    group.finish();
}

fn bench_ptr_fetch(c: &mut Criterion) {
    let mut table = PtrHashTable::new();
    for i in 0..10_000usize {
        table.insert(i * 16 + 8, i as u64);
    }
    c.bench_function("ptr_fetch_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 389) % 10_000;
            black_box(table.fetch(black_box(i * 16 + 8)))
        })
    });
    c.bench_function("ptr_fetch_miss", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 389) % 10_000;
            black_box(table.fetch(black_box(i * 16 + 9)))
        })
    });
}

fn bench_ptr_churn(c: &mut Criterion) {
    c.bench_function("ptr_delete_reinsert", |b| {
        let mut table = PtrHashTable::new();
        for i in 0..1_000usize {
            table.insert(i + 1, i as u64);
        }
        let mut i = 0usize;
        b.iter(|| {
            i = (i % 1_000) + 1;
            table.fetch_and_delete(black_box(i));
            table.insert(black_box(i), i as u64);
        })
    });
}

fn bench_name_insert_fetch(c: &mut Criterion) {
    let names: Vec<String> = (0..1_000).map(|i| format!("symbol-{}", i)).collect();
    c.bench_function("name_insert_1000", |b| {
        b.iter(|| {
            let mut table = NameHashTable::with_capacity(1_000);
            for (i, name) in names.iter().enumerate() {
                table.insert(black_box(name), i as i64);
            }
            black_box(table.len())
        })
    });
    let mut table = NameHashTable::new();
    for (i, name) in names.iter().enumerate() {
        table.insert(name, i as i64);
    }
    c.bench_function("name_fetch", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 389) % 1_000;
            black_box(table.fetch(black_box(&names[i])))
        })
    });
}

criterion_group!(
    benches,
    bench_ptr_insert,
    bench_ptr_fetch,
    bench_ptr_churn,
    bench_name_insert_fetch
);
criterion_main!(benches);
