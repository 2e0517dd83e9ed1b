//! Benchmarks for masked and unmasked matrix multiply

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use semiblas::{mxm, AxBMethod, Descriptor, DupPolicy, Matrix, Semiring, NO_MASK};

/// Deterministic matrix with about `per_row` entries in each row
fn generate_matrix(n: usize, per_row: usize) -> Matrix<f64> {
    let mut rows = Vec::with_capacity(n * per_row);
    let mut cols = Vec::with_capacity(n * per_row);
    let mut vals = Vec::with_capacity(n * per_row);
    for r in 0..n {
        for k in 0..per_row {
            rows.push(r);
            cols.push((r * 7919 + k * 104_729 + k * k) % n);
            vals.push(1.0 + (k % 5) as f64);
        }
    }
    Matrix::from_tuples(n, n, &rows, &cols, &vals, DupPolicy::Last).unwrap()
}

fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("mxm_methods");
    group.measurement_time(Duration::from_secs(3));
    group.sample_size(10);

    for &(n, per_row) in &[(1_000, 8), (5_000, 16)] {
        let a = generate_matrix(n, per_row);
        for method in [AxBMethod::Saxpy, AxBMethod::Dot, AxBMethod::Default] {
            let desc = Descriptor::default().method(method);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", method), n),
                &a,
                |b, a| {
                    b.iter(|| mxm(NO_MASK, &Semiring::plus_times(), black_box(a), black_box(a), &desc))
                },
            );
        }
    }
    group.finish();
}

fn bench_masked(c: &mut Criterion) {
    let mut group = c.benchmark_group("mxm_masked");
    group.measurement_time(Duration::from_secs(3));
    group.sample_size(10);

    // triangle-counting shape: C<A> = A*A'
    let a = generate_matrix(4_000, 12);
    for method in [AxBMethod::Dot, AxBMethod::Saxpy] {
        let desc = Descriptor::default().structural().transpose_b().method(method);
        group.bench_function(format!("{:?}", method), |b| {
            b.iter(|| mxm(Some(&a), &Semiring::<f64, f64, u64>::plus_pair(), black_box(&a), black_box(&a), &desc))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_methods, bench_masked);
criterion_main!(benches);
