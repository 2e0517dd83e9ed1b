//! Monoids: associative, commutative operators with an identity

use num_traits::{Bounded, Num};

use super::{BinaryOp, Opcode};
use crate::types::Scalar;

/// An associative and commutative operator with an identity value
///
/// An optional terminal value lets reductions stop early: once the running
/// value equals the terminal, adding anything more cannot change it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monoid<T> {
    op: BinaryOp<T, T, T>,
    identity: T,
    terminal: Option<T>,
}

impl<T: Scalar> Monoid<T> {
    /// Create a monoid from a user-defined operator
    ///
    /// The caller asserts that `op` is associative and commutative and that
    /// `identity` is its identity.
    pub fn new(op: BinaryOp<T, T, T>, identity: T) -> Self {
        Self {
            op,
            identity,
            terminal: None,
        }
    }

    /// Attach a terminal (annihilating) value
    pub fn with_terminal(mut self, terminal: T) -> Self {
        self.terminal = Some(terminal);
        self
    }

    #[inline(always)]
    pub fn add(&self, x: T, y: T) -> T {
        self.op.apply(x, y)
    }

    pub fn identity(&self) -> T {
        self.identity
    }

    pub fn terminal(&self) -> Option<T> {
        self.terminal
    }

    pub fn op(&self) -> BinaryOp<T, T, T> {
        self.op
    }

    /// True if a running value of `z` cannot change any further
    #[inline(always)]
    pub fn is_terminal(&self, z: &T) -> bool {
        if self.op.opcode() == Opcode::Any {
            return true;
        }
        match &self.terminal {
            Some(t) => t == z,
            None => false,
        }
    }

    /// Identity is the default value; every value is terminal
    pub fn any() -> Self {
        Self::new(BinaryOp::any(), T::default())
    }
}

impl<T: Scalar + Num> Monoid<T> {
    pub fn plus() -> Self {
        Self::new(BinaryOp::plus(), T::zero())
    }

    pub fn times() -> Self {
        Self::new(BinaryOp::times(), T::one())
    }
}

impl<T: Scalar + PartialOrd + Bounded> Monoid<T> {
    pub fn min() -> Self {
        Self::new(BinaryOp::min(), T::max_value()).with_terminal(T::min_value())
    }

    pub fn max() -> Self {
        Self::new(BinaryOp::max(), T::min_value()).with_terminal(T::max_value())
    }
}

impl Monoid<bool> {
    pub fn lor() -> Self {
        Self::new(BinaryOp::lor(), false).with_terminal(true)
    }

    pub fn land() -> Self {
        Self::new(BinaryOp::land(), true).with_terminal(false)
    }

    pub fn lxor() -> Self {
        Self::new(BinaryOp::lxor(), false)
    }
}
