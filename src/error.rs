//! Error types for semiblas

use thiserror::Error;

/// Result type alias using semiblas's error
pub type Result<T> = std::result::Result<T, GrbError>;

/// Errors that can occur in semiblas operations
///
/// Every public operation is all-or-nothing: when an error is returned the
/// output is not produced and the inputs are left exactly as they were.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GrbError {
    /// An allocation failed
    #[error("Out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        bytes: usize,
    },

    /// A matrix violates its structural invariants
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// An index is outside the dimension it addresses
    #[error("Index {index} out of bounds for dimension of size {bound}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        bound: usize,
    },

    /// Vectors are unsorted, which is only legal inside the library
    #[error("Matrix has unsorted (jumbled) vectors")]
    Jumbled,

    /// A specialized kernel declined the work; the caller falls back to the
    /// generic kernel
    #[error("No specialized kernel available")]
    NoValue,

    /// Operand dimensions are incompatible
    #[error("Dimension mismatch in {op}: {detail}")]
    DimensionMismatch {
        /// The operation name
        op: &'static str,
        /// Human-readable description of the conflicting dimensions
        detail: String,
    },

    /// Operand element types or operator domains are incompatible
    #[error("Domain mismatch: {0}")]
    DomainMismatch(String),

    /// An argument value is not acceptable
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The process-wide configuration was initialized twice
    #[error("Library already initialized")]
    AlreadyInitialized,
}

impl GrbError {
    /// Shorthand for a dimension mismatch error
    pub(crate) fn dims(op: &'static str, detail: impl Into<String>) -> Self {
        GrbError::DimensionMismatch {
            op,
            detail: detail.into(),
        }
    }

    /// Shorthand for an invalid-object error
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        GrbError::InvalidObject(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GrbError::OutOfMemory { bytes: 64 };
        assert_eq!(err.to_string(), "Out of memory: failed to allocate 64 bytes");

        let err = GrbError::IndexOutOfBounds { index: 7, bound: 3 };
        assert_eq!(
            err.to_string(),
            "Index 7 out of bounds for dimension of size 3"
        );

        let err = GrbError::dims("mxm", "A is 2x3, B is 4x4");
        assert_eq!(err.to_string(), "Dimension mismatch in mxm: A is 2x3, B is 4x4");
    }
}
