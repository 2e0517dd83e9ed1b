//! Element types
//!
//! Every matrix carries a [`Type`] descriptor derived once from its Rust
//! element type. Built-in numeric types and `bool` implement [`Scalar`];
//! user-defined element types implement it with [`TypeCode::UserDefined`].

use std::fmt;

/// Code identifying the element type of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Fp32,
    Fp64,
    /// Any type supplied by the user
    UserDefined,
}

/// Values that can be stored in a matrix
///
/// `Default` supplies the filler for unoccupied slots of bitmap storage;
/// it is never observable as an entry.
pub trait Scalar: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Type code of this element type
    const CODE: TypeCode;

    /// Value of this element when used as a valued mask
    fn is_truthy(&self) -> bool;
}

macro_rules! impl_scalar_numeric {
    ($($t:ty => $code:ident),* $(,)?) => {
        $(
            impl Scalar for $t {
                const CODE: TypeCode = TypeCode::$code;

                #[inline]
                fn is_truthy(&self) -> bool {
                    *self != <$t>::default()
                }
            }
        )*
    };
}

impl_scalar_numeric!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Fp32,
    f64 => Fp64,
);

impl Scalar for bool {
    const CODE: TypeCode = TypeCode::Bool;

    #[inline]
    fn is_truthy(&self) -> bool {
        *self
    }
}

/// Runtime descriptor of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    /// Type code
    pub code: TypeCode,
    /// Size of one element in bytes
    pub size: usize,
    /// Rust name of the element type
    pub name: &'static str,
}

impl Type {
    /// Descriptor of the element type `T`
    pub fn of<T: Scalar>() -> Self {
        Self {
            code: T::CODE,
            size: std::mem::size_of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_descriptor() {
        let t = Type::of::<f64>();
        assert_eq!(t.code, TypeCode::Fp64);
        assert_eq!(t.size, 8);

        let t = Type::of::<bool>();
        assert_eq!(t.code, TypeCode::Bool);
        assert_eq!(t.size, 1);
    }

    #[test]
    fn test_truthiness() {
        assert!(3i32.is_truthy());
        assert!(!0u8.is_truthy());
        assert!(!0.0f64.is_truthy());
        assert!(true.is_truthy());
    }
}
