//! Benchmarks for balance conversion and rate table parsing.
//!
//! Conversion runs inside the per-record critical section on every connect,
//! so it should stay in the tens of nanoseconds.
//!
//! ```sh
//! cargo bench --bench conversion_bench
//! cargo bench --bench conversion_bench -- time_from_balance
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::collections::BTreeMap;
use std::hint::black_box;
use coinlink_core::{PointMap, RateTable, points_from_balance, time_from_balance};

fn bench_time_from_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("time_from_balance");
    group.throughput(Throughput::Elements(1));

    let rates = RateTable::parse("1:10,5:60,10:180,20:300").unwrap_or_default();

    for balance in [1u64, 7, 35, 1_000] {
        group.bench_with_input(BenchmarkId::new("default_rates", balance), &balance, |b, &bal| {
            b.iter(|| black_box(time_from_balance(black_box(bal), &rates)));
        });
    }

    group.finish();
}

fn bench_points_from_balance(c: &mut Criterion) {
    let mut group = c.benchmark_group("points_from_balance");
    group.throughput(Throughput::Elements(1));

    let map = BTreeMap::from([
        ("1".to_string(), 0.5),
        ("5".to_string(), 1.0),
        ("10".to_string(), 3.0),
        ("20".to_string(), 5.0),
    ]);
    let points = PointMap::from_map(&map);

    group.bench_function("balance_35", |b| {
        b.iter(|| black_box(points_from_balance(black_box(35), &points, true)));
    });

    group.finish();
}

/// Parsing runs on every settings read, so it matters more than the greedy
/// walk itself.
fn bench_rate_table_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_table_parse");

    let cases = [
        ("default", "1:10,5:60,10:180,20:300"),
        ("padded", " 1 : 10 , 5 : 60 , 10 : 180 , 20 : 300 "),
        ("malformed", "1:10,five:60"),
    ];

    for (name, spec) in cases {
        group.bench_function(name, |b| {
            b.iter(|| black_box(RateTable::parse_or_default(black_box(spec))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_time_from_balance,
    bench_points_from_balance,
    bench_rate_table_parse
);
criterion_main!(benches);
