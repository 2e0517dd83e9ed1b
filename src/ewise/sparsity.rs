//! Output layout of element-wise operations
//!
//! | A        | B        | mask | emult        | add          |
//! |----------|----------|------|--------------|--------------|
//! | full     | full     | none | full         | full         |
//! | bitmap/F | bitmap/F | any  | bitmap       | bitmap       |
//! | hyper    | hyper    | any  | hypersparse  | hypersparse  |
//! | hyper    | bitmap/F | any  | hypersparse  | sparse       |
//! | other    |          | any  | sparse       | sparse       |
//!
//! The layout only decides which kernel builds the result; the result then
//! conforms to its own sparsity control like any other matrix.

use crate::matrix::Sparsity;

/// Layout built by `emult`: the intersection is at most as dense as its
/// sparsest operand
pub(crate) fn emult_sparsity(a: Sparsity, b: Sparsity, mask: Option<Sparsity>) -> Sparsity {
    if a == Sparsity::Full && b == Sparsity::Full && mask.is_none() {
        return Sparsity::Full;
    }
    match (a.is_sparse_like(), b.is_sparse_like()) {
        (false, false) => Sparsity::Bitmap,
        (true, true) if a == Sparsity::Hypersparse && b == Sparsity::Hypersparse => {
            Sparsity::Hypersparse
        }
        (true, false) if a == Sparsity::Hypersparse => Sparsity::Hypersparse,
        (false, true) if b == Sparsity::Hypersparse => Sparsity::Hypersparse,
        _ => Sparsity::Sparse,
    }
}

/// Layout built by `ewise_add`: the union holds every vector of either
/// operand
pub(crate) fn add_sparsity(a: Sparsity, b: Sparsity, mask: Option<Sparsity>) -> Sparsity {
    if a == Sparsity::Full && b == Sparsity::Full && mask.is_none() {
        return Sparsity::Full;
    }
    match (a.is_sparse_like(), b.is_sparse_like()) {
        (false, false) => Sparsity::Bitmap,
        _ if a == Sparsity::Hypersparse && b == Sparsity::Hypersparse => Sparsity::Hypersparse,
        _ => Sparsity::Sparse,
    }
}
