//! VALUES scan benchmarks.
//!
//! Benchmarks for:
//! - Plain literal lists (transient state on every row)
//! - Lists mixing in correlated sub-plans (persistent state)
//! - Rescans of an initialized operator

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use litscan_bench::{bench_context, correlated_rows, literal_rows, scan_all};
use litscan_common::ExecutorConfig;
use litscan_exec::{DefaultEvaluator, Operator, ValuesScanExec, ValuesScanNode};

/// Benchmark scanning plain literal lists.
fn bench_literal_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("values_scan/literal");

    for size in [100, 1_000, 10_000].iter() {
        let rows = literal_rows(*size, 42);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let mut ctx = bench_context(ExecutorConfig::default());
                let n = scan_all(ValuesScanNode::new(rows.clone()), &mut ctx)
                    .expect("scan failed");
                black_box(n)
            });
        });
    }

    group.finish();
}

/// Benchmark lists where a share of rows call a sub-plan.
fn bench_correlated_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("values_scan/correlated");
    let size = 10_000;
    group.throughput(Throughput::Elements(size as u64));

    for every in [1, 10, 100].iter() {
        let rows = correlated_rows(size, *every, 42);
        group.bench_with_input(BenchmarkId::new("every", every), &rows, |b, rows| {
            b.iter(|| {
                let mut ctx = bench_context(ExecutorConfig::default());
                let n = scan_all(ValuesScanNode::new(rows.clone()), &mut ctx)
                    .expect("scan failed");
                black_box(n)
            });
        });
    }

    group.finish();
}

/// Benchmark repeated rescans of one operator.
fn bench_rescan(c: &mut Criterion) {
    let mut group = c.benchmark_group("values_scan/rescan");
    let size = 1_000;
    group.throughput(Throughput::Elements(size as u64));

    let mut ctx = bench_context(ExecutorConfig::default());
    let mut exec = ValuesScanExec::init(
        ValuesScanNode::new(correlated_rows(size, 10, 42)),
        Arc::new(DefaultEvaluator::new()),
        &mut ctx,
    )
    .expect("init failed");

    group.bench_function("rescan_and_drain", |b| {
        b.iter(|| {
            exec.rescan(&mut ctx).expect("rescan failed");
            let mut count = 0usize;
            while exec.next_row(&mut ctx).expect("next_row failed").is_some() {
                count += 1;
            }
            black_box(count)
        });
    });

    group.finish();
    exec.shutdown(&mut ctx);
    ctx.finish();
}

criterion_group!(
    benches,
    bench_literal_scan,
    bench_correlated_scan,
    bench_rescan
);
criterion_main!(benches);
