//! Element-wise intersection and union

use std::collections::BTreeMap;

use proptest::prelude::*;
use semiblas::{
    emult, ewise_add, BinaryOp, Descriptor, DupPolicy, Matrix, Sparsity, SparsityControl, NO_MASK,
};

fn tuples(m: &Matrix<i32>) -> BTreeMap<(usize, usize), i32> {
    m.iter().unwrap().map(|(r, c, v)| ((r, c), v)).collect()
}

#[test]
fn test_emult_and_add_small() {
    let a = Matrix::from_tuples(2, 3, &[0, 0, 1], &[0, 2, 1], &[1, 2, 3], DupPolicy::Error).unwrap();
    let b = Matrix::from_tuples(2, 3, &[0, 1, 1], &[2, 1, 2], &[10, 20, 30], DupPolicy::Error).unwrap();

    let c = emult(NO_MASK, BinaryOp::times(), &a, &b, &Descriptor::default()).unwrap();
    assert_eq!(c.iter().unwrap().collect::<Vec<_>>(), vec![(0, 2, 20), (1, 1, 60)]);

    let c = ewise_add(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
    assert_eq!(
        c.iter().unwrap().collect::<Vec<_>>(),
        vec![(0, 0, 1), (0, 2, 12), (1, 1, 23), (1, 2, 30)]
    );
}

#[test]
fn test_dense_operands_stay_full() {
    let a = Matrix::dense(4, 4, 2).unwrap();
    let b = Matrix::dense(4, 4, 3).unwrap();
    let c = emult(NO_MASK, BinaryOp::times(), &a, &b, &Descriptor::default()).unwrap();
    assert_eq!(c.sparsity(), Sparsity::Full);
    assert!(c.iter().unwrap().all(|(_, _, v)| v == 6));
}

#[test]
fn test_dimension_mismatch() {
    let a = Matrix::<i32>::new(2, 3);
    let b = Matrix::<i32>::new(3, 2);
    assert!(emult(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).is_err());
    // B' matches A
    assert!(emult(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default().transpose_b()).is_ok());
}

fn layout() -> impl Strategy<Value = Sparsity> {
    prop_oneof![
        Just(Sparsity::Hypersparse),
        Just(Sparsity::Sparse),
        Just(Sparsity::Bitmap),
    ]
}

fn entries() -> impl Strategy<Value = BTreeMap<(usize, usize), i32>> {
    prop::collection::btree_map((0usize..6, 0usize..8), -9i32..9, 0..30)
}

fn build(e: &BTreeMap<(usize, usize), i32>, sparsity: Sparsity) -> Matrix<i32> {
    let rows: Vec<usize> = e.keys().map(|k| k.0).collect();
    let cols: Vec<usize> = e.keys().map(|k| k.1).collect();
    let vals: Vec<i32> = e.values().copied().collect();
    let mut m = Matrix::from_tuples(6, 8, &rows, &cols, &vals, DupPolicy::Error).unwrap();
    m.set_sparsity_control(SparsityControl::Fixed(sparsity)).unwrap();
    m
}

proptest! {
    /// emult holds exactly the coordinates both operands hold
    #[test]
    fn prop_emult_pattern(ea in entries(), eb in entries(), la in layout(), lb in layout()) {
        let (a, b) = (build(&ea, la), build(&eb, lb));
        let c = emult(NO_MASK, BinaryOp::minus(), &a, &b, &Descriptor::default()).unwrap();
        let expected: BTreeMap<_, _> = ea
            .iter()
            .filter_map(|(k, &x)| eb.get(k).map(|&y| (*k, x - y)))
            .collect();
        prop_assert_eq!(tuples(&c), expected);
    }

    /// ewise_add holds every coordinate either operand holds
    #[test]
    fn prop_add_pattern(ea in entries(), eb in entries(), la in layout(), lb in layout()) {
        let (a, b) = (build(&ea, la), build(&eb, lb));
        let c = ewise_add(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
        let mut expected = ea.clone();
        for (k, &y) in &eb {
            *expected.entry(*k).or_insert(0) += y;
        }
        prop_assert_eq!(tuples(&c), expected);
    }
}
