//! Matrix multiply across methods, layouts and orientations

use proptest::prelude::*;
use semiblas::{
    mxm, AxBMethod, Descriptor, DupPolicy, Matrix, Semiring, Sparsity, SparsityControl, NO_MASK,
};

/// Dense reference product over plus.times
fn reference(a: &Matrix<i64>, b: &Matrix<i64>) -> Vec<(usize, usize, i64)> {
    let (m, k, n) = (a.nrows(), a.ncols(), b.ncols());
    let mut da = vec![None; m * k];
    for (r, c, v) in a.iter().unwrap() {
        da[r * k + c] = Some(v);
    }
    let mut db = vec![None; k * n];
    for (r, c, v) in b.iter().unwrap() {
        db[r * n + c] = Some(v);
    }
    let mut out = Vec::new();
    for r in 0..m {
        for c in 0..n {
            let mut sum = None;
            for t in 0..k {
                if let (Some(x), Some(y)) = (da[r * k + t], db[t * n + c]) {
                    sum = Some(sum.unwrap_or(0) + x * y);
                }
            }
            if let Some(s) = sum {
                out.push((r, c, s));
            }
        }
    }
    out
}

#[test]
fn test_diagonal_squared() {
    let a = Matrix::from_tuples(3, 3, &[0, 1, 2], &[0, 1, 2], &[1, 2, 3], DupPolicy::Error).unwrap();
    let c = mxm(NO_MASK, &Semiring::plus_times(), &a, &a, &Descriptor::default()).unwrap();
    let triples: Vec<_> = c.iter().unwrap().collect();
    assert_eq!(triples, vec![(0, 0, 1), (1, 1, 4), (2, 2, 9)]);
    assert_eq!(c.nvals().unwrap(), 3);
    assert!(c.sparsity().is_sparse_like());
}

#[test]
fn test_methods_agree_on_every_layout() {
    let a = Matrix::from_tuples(
        4,
        5,
        &[0, 0, 1, 2, 3, 3],
        &[0, 4, 2, 1, 0, 3],
        &[1i64, 2, 3, 4, 5, 6],
        DupPolicy::Error,
    )
    .unwrap();
    let b = Matrix::from_tuples(
        5,
        3,
        &[0, 1, 2, 3, 4, 4],
        &[1, 0, 2, 2, 0, 1],
        &[7i64, 8, 9, 10, 11, 12],
        DupPolicy::Error,
    )
    .unwrap();
    let expected = reference(&a, &b);

    let layouts = [Sparsity::Hypersparse, Sparsity::Sparse, Sparsity::Bitmap];
    for la in layouts {
        for lb in layouts {
            let (mut a, mut b) = (a.dup(), b.dup());
            a.set_sparsity_control(SparsityControl::Fixed(la)).unwrap();
            b.set_sparsity_control(SparsityControl::Fixed(lb)).unwrap();
            for method in [AxBMethod::Default, AxBMethod::Dot, AxBMethod::Saxpy] {
                let desc = Descriptor::default().method(method);
                let c = mxm(NO_MASK, &Semiring::plus_times(), &a, &b, &desc).unwrap();
                let got: Vec<_> = c.iter().unwrap().collect();
                assert_eq!(got, expected, "{:?} x {:?} by {:?}", la, lb, method);
            }
        }
    }
}

#[test]
fn test_transposed_operands() {
    let a = Matrix::from_tuples(3, 2, &[0, 1, 2], &[0, 1, 0], &[1i64, 2, 3], DupPolicy::Error).unwrap();
    let at = a.transpose().unwrap();
    let direct = mxm(NO_MASK, &Semiring::plus_times(), &at, &a, &Descriptor::default()).unwrap();
    let desc = Descriptor::default().transpose_a();
    let flagged = mxm(NO_MASK, &Semiring::plus_times(), &a, &a, &desc).unwrap();
    assert_eq!(
        direct.iter().unwrap().collect::<Vec<_>>(),
        flagged.iter().unwrap().collect::<Vec<_>>()
    );
    // A'A = [10 0; 0 4]
    assert_eq!(flagged.extract_element(0, 0).unwrap(), Some(10));
    assert_eq!(flagged.extract_element(1, 1).unwrap(), Some(4));
    assert_eq!(flagged.extract_element(0, 1).unwrap(), None);
}

#[test]
fn test_masked_multiply() {
    let a = Matrix::<i64>::dense(3, 3, 1).unwrap();
    let m = Matrix::from_tuples(3, 3, &[0, 2], &[1, 2], &[true, true], DupPolicy::Error).unwrap();
    for method in [AxBMethod::Default, AxBMethod::Dot, AxBMethod::Saxpy] {
        let desc = Descriptor::default().method(method);
        let c = mxm(Some(&m), &Semiring::plus_times(), &a, &a, &desc).unwrap();
        assert_eq!(c.iter().unwrap().collect::<Vec<_>>(), vec![(0, 1, 3), (2, 2, 3)]);

        let desc = desc.complement();
        let c = mxm(Some(&m), &Semiring::plus_times(), &a, &a, &desc).unwrap();
        assert_eq!(c.nvals().unwrap(), 7);
        assert_eq!(c.extract_element(0, 1).unwrap(), None);
    }
}

#[test]
fn test_min_plus_paths() {
    let w = Matrix::from_tuples(3, 3, &[0, 0, 1], &[1, 2, 2], &[1.0, 5.0, 1.0], DupPolicy::Error).unwrap();
    let d = mxm(NO_MASK, &Semiring::min_plus(), &w, &w, &Descriptor::default()).unwrap();
    assert_eq!(d.extract_element(0, 2).unwrap(), Some(2.0));
    assert_eq!(d.nvals().unwrap(), 1);
}

fn sparse_matrix(nrows: usize, ncols: usize) -> impl Strategy<Value = Matrix<i64>> {
    prop::collection::vec((0..nrows, 0..ncols, -5i64..5), 0..40).prop_map(move |t| {
        let rows: Vec<usize> = t.iter().map(|e| e.0).collect();
        let cols: Vec<usize> = t.iter().map(|e| e.1).collect();
        let vals: Vec<i64> = t.iter().map(|e| e.2).collect();
        Matrix::from_tuples(nrows, ncols, &rows, &cols, &vals, DupPolicy::Last).unwrap()
    })
}

proptest! {
    /// Dot products and Gustavson's method compute the same product
    ///
    /// Values are integers so the comparison is exact. A floating-point
    /// `plus` may differ in the last bit once saxpy splits a heavy vector
    /// over several tasks and folds their partial sums.
    #[test]
    fn prop_dot_equals_saxpy(
        a in sparse_matrix(9, 7),
        b in sparse_matrix(7, 11),
        by_column in any::<bool>(),
    ) {
        let (mut a, mut b) = (a, b);
        a.set_csc(by_column).unwrap();
        b.set_csc(by_column).unwrap();
        let dot = Descriptor::default().method(AxBMethod::Dot);
        let saxpy = Descriptor::default().method(AxBMethod::Saxpy);
        let c1 = mxm(NO_MASK, &Semiring::plus_times(), &a, &b, &dot).unwrap();
        let c2 = mxm(NO_MASK, &Semiring::plus_times(), &a, &b, &saxpy).unwrap();
        let t1: Vec<_> = c1.iter().unwrap().collect();
        let t2: Vec<_> = c2.iter().unwrap().collect();
        prop_assert_eq!(&t1, &t2);
        prop_assert_eq!(t1, reference(&a, &b));
    }
}
