//! Binary operators z = f(x, y)

use std::fmt;

use num_traits::{Num, One};

use super::Opcode;
use crate::types::{Scalar, TypeCode};

/// A typed binary operator `z = f(x, y)`
///
/// Operators are plain function pointers, so they are `Copy`, `Send` and
/// `Sync` and can be shared by every task of a parallel call.
pub struct BinaryOp<X, Y, Z> {
    name: &'static str,
    opcode: Opcode,
    f: fn(X, Y) -> Z,
}

impl<X, Y, Z> Clone for BinaryOp<X, Y, Z> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<X, Y, Z> Copy for BinaryOp<X, Y, Z> {}

impl<X, Y, Z> fmt::Debug for BinaryOp<X, Y, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryOp")
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .finish()
    }
}

impl<X, Y, Z> PartialEq for BinaryOp<X, Y, Z> {
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode
            && self.name == other.name
            && self.f as usize == other.f as usize
    }
}

impl<X: Scalar, Y: Scalar, Z: Scalar> BinaryOp<X, Y, Z> {
    /// Create a user-defined operator
    pub fn new(name: &'static str, f: fn(X, Y) -> Z) -> Self {
        Self {
            name,
            opcode: Opcode::UserDefined,
            f,
        }
    }

    pub(crate) const fn builtin(name: &'static str, opcode: Opcode, f: fn(X, Y) -> Z) -> Self {
        Self { name, opcode, f }
    }

    /// Apply the operator
    #[inline(always)]
    pub fn apply(&self, x: X, y: Y) -> Z {
        (self.f)(x, y)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// `z = 1` for any x and y
    pub fn pair() -> Self
    where
        Z: One,
    {
        Self::builtin("pair", Opcode::Pair, pair_fn::<X, Y, Z>)
    }
}

fn first_fn<X, Y>(x: X, _y: Y) -> X {
    x
}

fn second_fn<X, Y>(_x: X, y: Y) -> Y {
    y
}

fn pair_fn<X, Y, Z: One>(_x: X, _y: Y) -> Z {
    Z::one()
}

fn pair_bool_fn<X, Y>(_x: X, _y: Y) -> bool {
    true
}

fn any_fn<T>(_x: T, y: T) -> T {
    y
}

fn plus_fn<T: Num>(x: T, y: T) -> T {
    x + y
}

fn minus_fn<T: Num>(x: T, y: T) -> T {
    x - y
}

fn times_fn<T: Num>(x: T, y: T) -> T {
    x * y
}

fn div_fn<T: Num + Scalar>(x: T, y: T) -> T {
    // integer division by zero yields zero instead of a panic
    let is_float = matches!(T::CODE, TypeCode::Fp32 | TypeCode::Fp64);
    if y.is_zero() && !is_float {
        T::zero()
    } else {
        x / y
    }
}

fn min_fn<T: PartialOrd>(x: T, y: T) -> T {
    if y < x {
        y
    } else {
        x
    }
}

fn max_fn<T: PartialOrd>(x: T, y: T) -> T {
    if y > x {
        y
    } else {
        x
    }
}

fn eq_fn<T: PartialEq>(x: T, y: T) -> bool {
    x == y
}

fn lor_fn(x: bool, y: bool) -> bool {
    x || y
}

fn land_fn(x: bool, y: bool) -> bool {
    x && y
}

fn lxor_fn(x: bool, y: bool) -> bool {
    x != y
}

impl<X: Scalar, Y: Scalar> BinaryOp<X, Y, X> {
    /// `z = x`
    pub fn first() -> Self {
        Self::builtin("first", Opcode::First, first_fn::<X, Y>)
    }
}

impl<X: Scalar, Y: Scalar> BinaryOp<X, Y, Y> {
    /// `z = y`
    pub fn second() -> Self {
        Self::builtin("second", Opcode::Second, second_fn::<X, Y>)
    }
}

impl<X: Scalar, Y: Scalar> BinaryOp<X, Y, bool> {
    /// `z = true` for any x and y
    pub fn pair_bool() -> Self {
        Self::builtin("pair", Opcode::Pair, pair_bool_fn::<X, Y>)
    }
}

impl<T: Scalar> BinaryOp<T, T, T> {
    /// `z = x` or `z = y`, whichever is cheaper to get
    pub fn any() -> Self {
        Self::builtin("any", Opcode::Any, any_fn::<T>)
    }
}

impl<T: Scalar + Num> BinaryOp<T, T, T> {
    pub fn plus() -> Self {
        Self::builtin("plus", Opcode::Plus, plus_fn::<T>)
    }

    pub fn minus() -> Self {
        Self::builtin("minus", Opcode::Minus, minus_fn::<T>)
    }

    pub fn times() -> Self {
        Self::builtin("times", Opcode::Times, times_fn::<T>)
    }

    pub fn div() -> Self {
        Self::builtin("div", Opcode::Div, div_fn::<T>)
    }
}

impl<T: Scalar + PartialOrd> BinaryOp<T, T, T> {
    pub fn min() -> Self {
        Self::builtin("min", Opcode::Min, min_fn::<T>)
    }

    pub fn max() -> Self {
        Self::builtin("max", Opcode::Max, max_fn::<T>)
    }
}

impl<T: Scalar> BinaryOp<T, T, bool> {
    /// `z = (x == y)`
    pub fn equal() -> Self {
        Self::builtin("eq", Opcode::Eq, eq_fn::<T>)
    }
}

impl BinaryOp<bool, bool, bool> {
    pub fn lor() -> Self {
        Self::builtin("lor", Opcode::Lor, lor_fn)
    }

    pub fn land() -> Self {
        Self::builtin("land", Opcode::Land, land_fn)
    }

    pub fn lxor() -> Self {
        Self::builtin("lxor", Opcode::Lxor, lxor_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_ops() {
        assert_eq!(BinaryOp::<i32, i32, i32>::plus().apply(2, 3), 5);
        assert_eq!(BinaryOp::<i32, i32, i32>::minus().apply(2, 3), -1);
        assert_eq!(BinaryOp::<f64, f64, f64>::times().apply(2.0, 3.5), 7.0);
        assert_eq!(BinaryOp::<i64, i64, i64>::min().apply(4, -4), -4);
        assert_eq!(BinaryOp::<u8, u8, u8>::max().apply(4, 9), 9);
    }

    #[test]
    fn test_integer_division_by_zero() {
        assert_eq!(BinaryOp::<i32, i32, i32>::div().apply(7, 0), 0);
        assert!(BinaryOp::<f64, f64, f64>::div().apply(1.0, 0.0).is_infinite());
    }

    #[test]
    fn test_positional_ops() {
        let first = BinaryOp::<i32, f64, i32>::first();
        assert_eq!(first.apply(4, 9.5), 4);
        assert!(first.opcode().ignores_y());

        let second = BinaryOp::<i32, f64, f64>::second();
        assert_eq!(second.apply(4, 9.5), 9.5);
        assert!(second.opcode().ignores_x());

        let pair = BinaryOp::<i32, f64, u64>::pair();
        assert_eq!(pair.apply(0, 0.0), 1);
    }

    #[test]
    fn test_user_defined_op() {
        let op = BinaryOp::<i32, i32, i32>::new("absdiff", |x, y| (x - y).abs());
        assert_eq!(op.apply(3, 10), 7);
        assert_eq!(op.opcode(), Opcode::UserDefined);
        assert_eq!(op, op);
        assert_ne!(op, BinaryOp::<i32, i32, i32>::plus());
    }
}
