//! Accumulators for the saxpy multiply
//!
//! An accumulator collects the products `A(i,k) * B(k,j)` of one output
//! vector `j` and folds those landing on the same index `i` with the
//! semiring's monoid. The saxpy kernel picks one per vector from its flop
//! count: the sort-based accumulator for small vectors, the dense gather
//! workspace otherwise.

pub mod dense;
pub mod sort;

pub use dense::DenseAccumulator;
pub use sort::SortAccumulator;

use crate::constants::SORT_ACCUMULATOR_THRESHOLD;

/// Collects and folds the entries of one output vector
pub trait Accumulator<T> {
    /// Reset the accumulator to prepare for a new vector
    fn reset(&mut self);

    /// Fold `value` into the entry at `index`
    fn accumulate(&mut self, index: usize, value: T);

    /// Append the folded entries, sorted by index, and reset
    fn extract_into(&mut self, indices: &mut Vec<usize>, values: &mut Vec<T>);
}

/// True if a vector of `flops` products should use the sort-based
/// accumulator
#[inline]
pub fn prefers_sort(flops: usize) -> bool {
    flops <= SORT_ACCUMULATOR_THRESHOLD
}
