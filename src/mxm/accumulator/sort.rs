//! Sort-based accumulator
//!
//! Products are appended unsorted, then sorted by index and folded. Cheaper
//! than the dense workspace when a vector has few products.

use super::Accumulator;
use crate::ops::Monoid;
use crate::types::Scalar;

/// Unsorted list of `(index, product)` pairs
pub struct SortAccumulator<T> {
    entries: Vec<(usize, T)>,
    add: Monoid<T>,
}

impl<T: Scalar> SortAccumulator<T> {
    /// Create a sort-based accumulator
    ///
    /// # Arguments
    ///
    /// * `initial_capacity` - Initial capacity for the temporary storage
    /// * `add` - Monoid folding products with the same index
    pub fn new(initial_capacity: usize, add: Monoid<T>) -> Self {
        Self {
            entries: Vec::with_capacity(initial_capacity),
            add,
        }
    }
}

impl<T: Scalar> Accumulator<T> for SortAccumulator<T> {
    fn reset(&mut self) {
        self.entries.clear();
    }

    #[inline]
    fn accumulate(&mut self, index: usize, value: T) {
        self.entries.push((index, value));
    }

    fn extract_into(&mut self, indices: &mut Vec<usize>, values: &mut Vec<T>) {
        // stable, so products of one index fold in arrival order
        self.entries.sort_by_key(|&(i, _)| i);
        let mut entries = self.entries.iter();
        if let Some(&(first, x)) = entries.next() {
            let (mut current, mut acc) = (first, x);
            for &(i, x) in entries {
                if i == current {
                    acc = self.add.add(acc, x);
                } else {
                    indices.push(current);
                    values.push(acc);
                    current = i;
                    acc = x;
                }
            }
            indices.push(current);
            values.push(acc);
        }
        self.reset();
    }
}
