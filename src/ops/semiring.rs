//! Semirings: an additive monoid paired with a multiplicative operator

use num_traits::{Bounded, Num, One};

use super::{BinaryOp, Monoid};
use crate::types::Scalar;

/// Algebra used by matrix multiplication: `c(i,j) = add_k mult(a(i,k), b(k,j))`
///
/// `X` and `Y` are the element types of the left and right operands and `Z`
/// the type of the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Semiring<X, Y, Z> {
    add: Monoid<Z>,
    multiply: BinaryOp<X, Y, Z>,
}

impl<X: Scalar, Y: Scalar, Z: Scalar> Semiring<X, Y, Z> {
    pub fn new(add: Monoid<Z>, multiply: BinaryOp<X, Y, Z>) -> Self {
        Self { add, multiply }
    }

    pub fn add(&self) -> &Monoid<Z> {
        &self.add
    }

    pub fn multiply(&self) -> &BinaryOp<X, Y, Z> {
        &self.multiply
    }

    /// Short name such as `plus_times`
    pub fn name(&self) -> String {
        format!("{}_{}", self.add.op().name(), self.multiply.name())
    }
}

impl<T: Scalar + Num> Semiring<T, T, T> {
    /// Conventional linear algebra
    pub fn plus_times() -> Self {
        Self::new(Monoid::plus(), BinaryOp::times())
    }
}

impl<T: Scalar + Num + PartialOrd + Bounded> Semiring<T, T, T> {
    /// Shortest paths
    pub fn min_plus() -> Self {
        Self::new(Monoid::min(), BinaryOp::plus())
    }

    /// Longest paths
    pub fn max_plus() -> Self {
        Self::new(Monoid::max(), BinaryOp::plus())
    }

    pub fn max_times() -> Self {
        Self::new(Monoid::max(), BinaryOp::times())
    }

    pub fn min_times() -> Self {
        Self::new(Monoid::min(), BinaryOp::times())
    }
}

impl Semiring<bool, bool, bool> {
    /// Reachability
    pub fn lor_land() -> Self {
        Self::new(Monoid::lor(), BinaryOp::land())
    }
}

impl<X: Scalar, Y: Scalar, Z: Scalar + Num + One> Semiring<X, Y, Z> {
    /// Counts the shared indices of each pair of vectors
    pub fn plus_pair() -> Self {
        Self::new(Monoid::plus(), BinaryOp::pair())
    }
}

impl<X: Scalar, Y: Scalar> Semiring<X, Y, bool> {
    /// Structural product: true wherever any shared index exists
    pub fn any_pair() -> Self {
        Self::new(Monoid::any(), BinaryOp::pair_bool())
    }
}

impl<X: Scalar + Num, Y: Scalar> Semiring<X, Y, X> {
    pub fn plus_first() -> Self {
        Self::new(Monoid::plus(), BinaryOp::first())
    }
}

impl<X: Scalar + Num + PartialOrd + Bounded, Y: Scalar> Semiring<X, Y, X> {
    pub fn min_first() -> Self {
        Self::new(Monoid::min(), BinaryOp::first())
    }
}

impl<X: Scalar, Y: Scalar + Num> Semiring<X, Y, Y> {
    pub fn plus_second() -> Self {
        Self::new(Monoid::plus(), BinaryOp::second())
    }
}

impl<X: Scalar, Y: Scalar + Num + PartialOrd + Bounded> Semiring<X, Y, Y> {
    pub fn min_second() -> Self {
        Self::new(Monoid::min(), BinaryOp::second())
    }
}
