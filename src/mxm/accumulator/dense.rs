//! Dense gather accumulator
//!
//! One slot per output index, plus a list of the slots touched so far so a
//! reset only clears what was used. The workspace lives for a whole task
//! and is reused across its vectors.

use std::alloc::Layout;

use aligned_vec::AVec;

use super::Accumulator;
use crate::constants::DEFAULT_CACHE_LINE_SIZE;
use crate::error::{GrbError, Result};
use crate::matrix::buffer::try_alloc;
use crate::ops::Monoid;
use crate::types::Scalar;

/// Gather workspace of length `vlen`
pub struct DenseAccumulator<T> {
    /// Running values, valid where `occupied` is set
    values: AVec<T>,

    /// Flags to track which slots hold a value
    occupied: Vec<bool>,

    /// Slots in the order they were first touched
    touched: Vec<usize>,

    /// Mask entries scattered for the current vector
    mask: Vec<bool>,
    mask_touched: Vec<usize>,

    add: Monoid<T>,
}

impl<T: Scalar> DenseAccumulator<T> {
    /// Create a workspace for vectors of length `vlen`
    ///
    /// # Errors
    ///
    /// [`GrbError::OutOfMemory`] when the workspace cannot be allocated.
    pub fn new(vlen: usize, add: Monoid<T>) -> Result<Self> {
        // AVec cannot report failure, so the fallible arrays are requested first
        let occupied = try_alloc(vlen, false)?;
        let mask = try_alloc(vlen, false)?;
        let bytes = vlen
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(GrbError::OutOfMemory { bytes: usize::MAX })?;
        Layout::from_size_align(bytes, DEFAULT_CACHE_LINE_SIZE)
            .map_err(|_| GrbError::OutOfMemory { bytes })?;
        Ok(Self {
            values: AVec::from_iter(DEFAULT_CACHE_LINE_SIZE, (0..vlen).map(|_| T::default())),
            occupied,
            touched: Vec::new(),
            mask,
            mask_touched: Vec::new(),
            add,
        })
    }

    /// Mark `indices` as the set entries of the mask for the next vector
    pub fn scatter_mask(&mut self, indices: impl Iterator<Item = usize>) {
        for i in indices {
            if !self.mask[i] {
                self.mask[i] = true;
                self.mask_touched.push(i);
            }
        }
    }

    /// True if index `i` was scattered from the mask
    #[inline(always)]
    pub fn is_masked(&self, i: usize) -> bool {
        self.mask[i]
    }

    fn clear_mask(&mut self) {
        for &i in &self.mask_touched {
            self.mask[i] = false;
        }
        self.mask_touched.clear();
    }
}

impl<T: Scalar> Accumulator<T> for DenseAccumulator<T> {
    fn reset(&mut self) {
        for &i in &self.touched {
            self.occupied[i] = false;
        }
        self.touched.clear();
        self.clear_mask();
    }

    #[inline(always)]
    fn accumulate(&mut self, index: usize, value: T) {
        if !self.occupied[index] {
            self.occupied[index] = true;
            self.touched.push(index);
            self.values[index] = value;
        } else {
            self.values[index] = self.add.add(self.values[index], value);
        }
    }

    fn extract_into(&mut self, indices: &mut Vec<usize>, values: &mut Vec<T>) {
        self.touched.sort_unstable();
        indices.extend_from_slice(&self.touched);
        values.extend(self.touched.iter().map(|&i| self.values[i]));
        self.reset();
    }
}
