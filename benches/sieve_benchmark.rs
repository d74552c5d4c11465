//! Benchmarks for the sieve and response shaping.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use primes_api::server::types::PrimesResponse;
use primes_api::sieve::{primes_up_to, timed_sieve};
use std::hint::black_box;

fn bench_sieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("sieve");

    for limit in [1_000u64, 100_000, 1_000_000, 10_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.iter(|| primes_up_to(black_box(limit)).unwrap())
        });
    }

    group.finish();
}

fn bench_response_shaping(c: &mut Criterion) {
    let small = timed_sieve(100).unwrap();
    let large = timed_sieve(1_000_000).unwrap();

    c.bench_function("shape_full_list", |b| {
        b.iter(|| PrimesResponse::from_result(100, black_box(small.clone())))
    });

    c.bench_function("shape_truncated_list", |b| {
        b.iter(|| PrimesResponse::from_result(1_000_000, black_box(large.clone())))
    });
}

criterion_group!(benches, bench_sieve, bench_response_shaping);
criterion_main!(benches);
