//! Bitmap assignment

use proptest::prelude::*;
use semiblas::{
    assign, subassign, AssignSource, BinaryOp, Descriptor, DupPolicy, IndexList, Matrix, Sparsity,
    NO_MASK,
};

fn presence(c: &Matrix<i32>) -> (Vec<u8>, usize) {
    let e = c.dup().export().unwrap();
    assert_eq!(e.sparsity, Sparsity::Bitmap);
    (e.b.unwrap_or_default(), e.nvals)
}

#[test]
fn test_scalar_assign_then_accumulate() {
    let mut c = Matrix::<i32>::new_with(2, 2, false, Sparsity::Bitmap).unwrap();
    let (rows, cols) = (IndexList::List(vec![0]), IndexList::List(vec![1]));
    let desc = Descriptor::default();

    assign(&mut c, NO_MASK, None, AssignSource::Scalar(5), &rows, &cols, &desc).unwrap();
    assert_eq!(presence(&c), (vec![0, 1, 0, 0], 1));

    assign(&mut c, NO_MASK, Some(BinaryOp::plus()), AssignSource::Scalar(5), &rows, &cols, &desc)
        .unwrap();
    assert_eq!(c.extract_element(0, 1).unwrap(), Some(10));
    assert_eq!(presence(&c), (vec![0, 1, 0, 0], 1));
}

#[test]
fn test_strided_region() {
    let mut c = Matrix::<i32>::new_with(6, 6, true, Sparsity::Bitmap).unwrap();
    let rows = IndexList::Stride { begin: 5, end: 0, inc: -2 };
    let cols = IndexList::Range { begin: 2, end: 4 };
    assign(&mut c, NO_MASK, None, AssignSource::Scalar(1), &rows, &cols, &Descriptor::default())
        .unwrap();
    let got: Vec<_> = c.iter().unwrap().map(|(r, col, _)| (r, col)).collect();
    assert_eq!(got, vec![(1, 2), (1, 3), (3, 2), (3, 3), (5, 2), (5, 3)]);
}

#[test]
fn test_subassign_with_matrix_and_mask() {
    let mut c = Matrix::<i32>::dense(4, 4, 0).unwrap();
    let a = Matrix::from_tuples(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[1, 2, 3, 4], DupPolicy::Error)
        .unwrap();
    let m = Matrix::from_tuples(2, 2, &[0, 1], &[1, 0], &[true, true], DupPolicy::Error).unwrap();
    let rows = IndexList::List(vec![3, 0]);
    let cols = IndexList::List(vec![1, 2]);
    subassign(&mut c, Some(&m), None, AssignSource::Matrix(&a), &rows, &cols, &Descriptor::default())
        .unwrap();
    // mask (0,1) -> C(3,2) = A(0,1); mask (1,0) -> C(0,1) = A(1,0)
    assert_eq!(c.extract_element(3, 2).unwrap(), Some(2));
    assert_eq!(c.extract_element(0, 1).unwrap(), Some(3));
    assert_eq!(c.extract_element(3, 1).unwrap(), Some(0));
    assert_eq!(c.nvals().unwrap(), 16);
}

fn region() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (
        prop::collection::vec(0usize..5, 1..4),
        prop::collection::vec(0usize..7, 1..4),
    )
}

fn step() -> impl Strategy<Value = ((Vec<usize>, Vec<usize>), i32, bool, bool, Option<bool>)> {
    (region(), -3i32..3, any::<bool>(), any::<bool>(), prop::option::of(any::<bool>()))
}

proptest! {
    /// The entry count of a bitmap matches its presence bytes after any
    /// sequence of assignments
    #[test]
    fn prop_bitmap_accounting(steps in prop::collection::vec(step(), 1..8)) {
        let mut c = Matrix::<i32>::new_with(5, 7, false, Sparsity::Bitmap).unwrap();
        let mask = Matrix::from_tuples(5, 7, &[0, 2, 4, 1], &[0, 3, 6, 1], &[true, true, false, true], DupPolicy::Error)
            .unwrap();
        for ((rows, cols), v, accum, replace, masked) in steps {
            let (rows, cols) = (IndexList::List(rows), IndexList::List(cols));
            let mut desc = Descriptor::default();
            if replace {
                desc = desc.replace();
            }
            let mut m = None;
            if let Some(comp) = masked {
                m = Some(&mask);
                if comp {
                    desc = desc.complement();
                }
            }
            let accum = accum.then(BinaryOp::plus);
            assign(&mut c, m, accum, AssignSource::Scalar(v), &rows, &cols, &desc).unwrap();
            let (b, nvals) = presence(&c);
            prop_assert_eq!(nvals, b.iter().filter(|&&x| x != 0).count());
            prop_assert_eq!(nvals, c.nvals().unwrap());
        }
    }
}
