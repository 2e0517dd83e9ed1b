//! Operator capabilities consumed by the engine
//!
//! A [`Semiring`] pairs an additive [`Monoid`] with a multiplicative
//! [`BinaryOp`]. The engine never inspects operator internals beyond the
//! [`Opcode`], which only selects specialized kernel flavors; every
//! operator, built-in or user-defined, also runs through the generic path.

pub mod binary;
pub mod monoid;
pub mod semiring;

pub use binary::BinaryOp;
pub use monoid::Monoid;
pub use semiring::Semiring;

/// Identifies the function behind an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// z = x
    First,
    /// z = y
    Second,
    /// z = 1, reads neither operand
    Pair,
    /// z = x or y, whichever is at hand
    Any,
    Plus,
    Minus,
    Times,
    Div,
    Min,
    Max,
    Lor,
    Land,
    Lxor,
    Eq,
    /// Supplied by the user
    UserDefined,
}

impl Opcode {
    /// True if z does not depend on x
    pub fn ignores_x(&self) -> bool {
        matches!(self, Opcode::Second | Opcode::Pair)
    }

    /// True if z does not depend on y
    pub fn ignores_y(&self) -> bool {
        matches!(self, Opcode::First | Opcode::Pair)
    }
}
