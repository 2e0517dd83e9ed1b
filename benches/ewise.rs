//! Benchmarks for element-wise operations and assignment

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use semiblas::{
    assign, emult, ewise_add, AssignSource, BinaryOp, Descriptor, DupPolicy, IndexList, Matrix,
    Sparsity, SparsityControl, NO_MASK,
};

fn generate_matrix(n: usize, per_row: usize, seed: usize) -> Matrix<f64> {
    let mut rows = Vec::with_capacity(n * per_row);
    let mut cols = Vec::with_capacity(n * per_row);
    let mut vals = Vec::with_capacity(n * per_row);
    for r in 0..n {
        for k in 0..per_row {
            rows.push(r);
            cols.push((r * 31 + k * 613 + seed) % n);
            vals.push(k as f64);
        }
    }
    Matrix::from_tuples(n, n, &rows, &cols, &vals, DupPolicy::Last).unwrap()
}

fn bench_ewise(c: &mut Criterion) {
    let mut group = c.benchmark_group("ewise");
    group.sample_size(20);

    for sparsity in [Sparsity::Sparse, Sparsity::Bitmap] {
        let mut a = generate_matrix(2_000, 32, 0);
        let mut b = generate_matrix(2_000, 32, 7);
        a.set_sparsity_control(SparsityControl::Fixed(sparsity)).unwrap();
        b.set_sparsity_control(SparsityControl::Fixed(sparsity)).unwrap();
        let desc = Descriptor::default();

        group.bench_with_input(BenchmarkId::new("emult", sparsity), &(&a, &b), |bench, (a, b)| {
            bench.iter(|| emult(NO_MASK, BinaryOp::times(), black_box(*a), black_box(*b), &desc))
        });
        group.bench_with_input(BenchmarkId::new("add", sparsity), &(&a, &b), |bench, (a, b)| {
            bench.iter(|| ewise_add(NO_MASK, BinaryOp::plus(), black_box(*a), black_box(*b), &desc))
        });
    }
    group.finish();
}

fn bench_assign(c: &mut Criterion) {
    let base = Matrix::<f64>::new_with(2_000, 2_000, false, Sparsity::Bitmap).unwrap();
    let rows = IndexList::Stride { begin: 0, end: 2_000, inc: 3 };
    let cols = IndexList::Range { begin: 100, end: 1_900 };
    let desc = Descriptor::default();

    c.bench_function("bitmap_assign_scalar", |bench| {
        bench.iter(|| {
            let mut m = base.dup();
            assign(&mut m, NO_MASK, Some(BinaryOp::plus()), AssignSource::Scalar(1.0), &rows, &cols, &desc)
                .unwrap();
            black_box(m)
        })
    });
}

criterion_group!(benches, bench_ewise, bench_assign);
criterion_main!(benches);
