//! Utility functions and helpers

pub mod formats;

use crate::error::{GrbError, Result};
use crate::matrix::buffer::try_with_capacity;

/// Computes an exclusive prefix sum (scan) for a vector
///
/// The result starts at 0 and has one more element than `input`.
///
/// # Errors
///
/// [`GrbError::OutOfMemory`] when the total does not fit in `usize`.
pub fn exclusive_scan(input: &[usize]) -> Result<Vec<usize>> {
    let mut result = try_with_capacity(input.len() + 1)?;
    let mut sum: usize = 0;
    result.push(sum);
    for &val in input {
        sum = sum
            .checked_add(val)
            .ok_or(GrbError::OutOfMemory { bytes: usize::MAX })?;
        result.push(sum);
    }
    Ok(result)
}

/// Splits `data` into consecutive mutable pieces at the given offsets
///
/// `offsets` is non-decreasing, starts at 0 and ends at most at
/// `data.len()`; piece `k` is `offsets[k]..offsets[k+1]`. Lets parallel
/// tasks write disjoint ranges of one output array.
pub fn split_by_offsets<'a, T>(mut data: &'a mut [T], offsets: &[usize]) -> Vec<&'a mut [T]> {
    let mut pieces = Vec::with_capacity(offsets.len().saturating_sub(1));
    for w in offsets.windows(2) {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(w[1] - w[0]);
        pieces.push(head);
        data = tail;
    }
    pieces
}
