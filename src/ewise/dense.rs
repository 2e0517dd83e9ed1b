//! Dense path for two full operands
//!
//! With both operands full and no mask, every output slot is an entry, so
//! intersection and union coincide and no pattern is built at all.

use rayon::prelude::*;

use crate::error::Result;
use crate::matrix::buffer::try_with_capacity;
use crate::ops::BinaryOp;
use crate::parallel;
use crate::types::Scalar;

/// `z[p] = op(x[p], y[p])` for every position
pub(crate) fn ewise_full<X, Y, Z>(
    x: &[X],
    y: &[Y],
    op: BinaryOp<X, Y, Z>,
    nthreads: usize,
) -> Result<Vec<Z>>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
{
    let mut z = try_with_capacity(x.len())?;
    parallel::install(nthreads, || {
        x.par_iter()
            .zip(y.par_iter())
            .map(|(&a, &b)| op.apply(a, b))
            .collect_into_vec(&mut z)
    })?;
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ewise_full() {
        let x = [1, 2, 3, 4];
        let y = [10, 20, 30, 40];
        let z = ewise_full(&x, &y, BinaryOp::plus(), 1).unwrap();
        assert_eq!(z, vec![11, 22, 33, 44]);

        let z = ewise_full(&x, &y, BinaryOp::<i32, i32, bool>::pair_bool(), 2).unwrap();
        assert!(z.iter().all(|&v| v));
    }
}
