//! The process-wide thread budget bounds every kernel and does not change
//! results. It installs its own configuration, so it runs in its own test
//! binary.

use semiblas::config::{self, GrbConfig, SystemParameters};
use semiblas::parallel;
use semiblas::{
    assign, emult, ewise_add, mxm, AssignSource, AxBMethod, BinaryOp, Descriptor, DupPolicy,
    IndexList, Matrix, Semiring, NO_MASK,
};

type Triples = Vec<(usize, usize, i64)>;

/// Deterministic sparse matrix with roughly `per_row` entries per row
fn generated(nrows: usize, ncols: usize, per_row: usize, seed: u64) -> Matrix<i64> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };
    let (mut rows, mut cols, mut vals) = (Vec::new(), Vec::new(), Vec::new());
    for r in 0..nrows {
        for _ in 0..per_row {
            rows.push(r);
            cols.push(next() % ncols);
            vals.push((next() % 7) as i64 - 3);
        }
    }
    Matrix::from_tuples(nrows, ncols, &rows, &cols, &vals, DupPolicy::Op(BinaryOp::plus())).unwrap()
}

fn triples(m: &Matrix<i64>) -> Triples {
    m.iter().unwrap().collect()
}

/// mxm by both methods, emult, add, and an accumulated assign
fn run_all(a: &Matrix<i64>, b: &Matrix<i64>) -> Vec<Triples> {
    let mut out = Vec::new();
    for method in [AxBMethod::Dot, AxBMethod::Saxpy] {
        let desc = Descriptor::default().method(method);
        let c = mxm(NO_MASK, &Semiring::plus_times(), a, b, &desc).unwrap();
        out.push(triples(&c));
    }
    let desc = Descriptor::default();
    out.push(triples(&emult(NO_MASK, BinaryOp::times(), a, b, &desc).unwrap()));
    out.push(triples(&ewise_add(NO_MASK, BinaryOp::plus(), a, b, &desc).unwrap()));

    let mut c = a.dup();
    let rows = IndexList::Stride { begin: 1, end: a.nrows(), inc: 3 };
    let cols = IndexList::Range { begin: 0, end: a.ncols() / 2 };
    assign(&mut c, NO_MASK, Some(BinaryOp::plus()), AssignSource::Scalar(2), &rows, &cols, &desc)
        .unwrap();
    out.push(triples(&c));
    out
}

#[test]
fn test_thread_budget_bounds_pools_and_keeps_results() {
    config::init(GrbConfig {
        system_params: SystemParameters {
            n_threads: 4,
            chunk: 1.0,
            ..SystemParameters::default()
        },
        ..GrbConfig::default()
    })
    .unwrap();

    let a = generated(300, 300, 12, 7);
    let b = generated(300, 300, 12, 11);

    let budget = config::context().nthreads_for(1e9);
    assert_eq!(budget, 4);
    assert_eq!(parallel::install(budget, rayon::current_num_threads).unwrap(), 4);
    let wide = run_all(&a, &b);

    config::set_nthreads(1).unwrap();
    let budget = config::context().nthreads_for(1e9);
    assert_eq!(budget, 1);
    assert_eq!(parallel::install(budget, rayon::current_num_threads).unwrap(), 1);
    let narrow = run_all(&a, &b);

    assert_eq!(wide.len(), narrow.len());
    for (w, n) in wide.iter().zip(&narrow) {
        assert_eq!(w, n);
    }
    // both methods agree with each other too
    assert_eq!(wide[0], wide[1]);
    assert!(!wide[0].is_empty());
}
