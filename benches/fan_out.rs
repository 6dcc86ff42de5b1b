//! Benchmarks for tick processing and fan-out
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use faucet_rs::{rate_per_minute, Context, Pipe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Run a pipe until `values` have been fanned out to `outputs` outputs.
fn run_pipe(outputs: usize, values: u64) {
    let (ctx, cancel) = Context::with_cancel(&Context::background());
    let pipe: Pipe<u64> = Pipe::named("bench");

    let next = AtomicU64::new(0);
    pipe.add_input(move |_| Ok(Some(next.fetch_add(1, Ordering::Relaxed) + 1)));

    for index in 0..outputs {
        let cancel = cancel.clone();
        pipe.add_output(move |_, value: &u64| {
            black_box(*value);
            if index == 0 && *value >= values {
                cancel.cancel();
            }
            Ok(())
        });
    }

    pipe.start(&ctx, Duration::from_nanos(1));
    pipe.done().wait();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.sample_size(20);

    let values = 200;
    for outputs in [1, 4, 16].iter() {
        group.throughput(Throughput::Elements(values));
        group.bench_with_input(
            BenchmarkId::new("outputs", outputs),
            outputs,
            |b, &outputs| {
                b.iter(|| run_pipe(outputs, values));
            },
        );
    }

    group.finish();
}

fn bench_rate_per_minute(c: &mut Criterion) {
    c.bench_function("rate_per_minute", |b| {
        let mut count = 1u32;
        b.iter(|| {
            count = count.wrapping_add(1).max(1);
            black_box(rate_per_minute(black_box(count)))
        });
    });
}

criterion_group!(benches, bench_fan_out, bench_rate_per_minute);

criterion_main!(benches);
