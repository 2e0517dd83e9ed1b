//! Shared, copy-on-write component arrays
//!
//! A matrix owns its arrays through [`Buffer`]s. Cloning a buffer shares it
//! (a shallow copy); the first write through a shared buffer copies it, so a
//! borrower can never observe or cause a change in the lender.

use std::ops::Deref;
use std::sync::Arc;

use crate::error::{GrbError, Result};

/// Reference-counted array with copy-on-write semantics
#[derive(Debug)]
pub struct Buffer<T>(Arc<Vec<T>>);

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Buffer(Arc::clone(&self.0))
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Buffer(Arc::new(Vec::new()))
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(v: Vec<T>) -> Self {
        Buffer(Arc::new(v))
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.0.as_slice()
    }
}

impl<T: PartialEq> PartialEq for Buffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl<T> Buffer<T> {
    /// True if another matrix holds this same array
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }
}

impl<T: Clone> Buffer<T> {
    /// Mutable access, copying the array first if it is shared
    pub fn make_mut(&mut self) -> &mut Vec<T> {
        Arc::make_mut(&mut self.0)
    }

    /// Take the array out, copying it if it is shared
    pub fn into_vec(self) -> Vec<T> {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| shared.as_ref().clone())
    }
}

fn oom<T>(n: usize) -> GrbError {
    GrbError::OutOfMemory {
        bytes: n.saturating_mul(std::mem::size_of::<T>()),
    }
}

/// Allocate an empty vector able to hold `n` elements
pub fn try_with_capacity<T>(n: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| oom::<T>(n))?;
    Ok(v)
}

/// Allocate a vector of `n` copies of `value`
pub fn try_alloc<T: Clone>(n: usize, value: T) -> Result<Vec<T>> {
    let mut v = try_with_capacity(n)?;
    v.resize(n, value);
    Ok(v)
}

/// Number of slots of a `vlen`-by-`vdim` dense layout
pub fn dense_len(vlen: usize, vdim: usize) -> Result<usize> {
    vlen.checked_mul(vdim)
        .ok_or(GrbError::OutOfMemory { bytes: usize::MAX })
}
