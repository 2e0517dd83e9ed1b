//! Index lists selecting the rows or columns of an assignment

use crate::error::{GrbError, Result};
use crate::matrix::buffer::try_alloc;

/// A sequence of indices into one dimension of a matrix
///
/// Ranges and strides are half-open: `end` itself is never included. A
/// stride with a negative increment counts down from `begin` while the
/// index stays above `end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexList {
    /// Every index of the dimension, in order
    All,
    /// `begin, begin + 1, ..` below `end`
    Range { begin: usize, end: usize },
    /// `begin, begin + inc, ..` up to but excluding `end`
    Stride { begin: usize, end: usize, inc: isize },
    /// Explicit indices, duplicates allowed
    List(Vec<usize>),
}

impl IndexList {
    /// Number of indices selected from a dimension of size `dim`
    pub fn len(&self, dim: usize) -> usize {
        match self {
            IndexList::All => dim,
            IndexList::Range { begin, end } => end.saturating_sub(*begin),
            IndexList::Stride { begin, end, inc } => {
                let step = inc.unsigned_abs();
                if step == 0 {
                    return 0;
                }
                let span = if *inc > 0 {
                    end.saturating_sub(*begin)
                } else {
                    begin.saturating_sub(*end)
                };
                span.div_ceil(step)
            }
            IndexList::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self, dim: usize) -> bool {
        self.len(dim) == 0
    }

    /// The `k`-th selected index
    #[inline]
    pub fn get(&self, k: usize) -> usize {
        match self {
            IndexList::All => k,
            IndexList::Range { begin, .. } => begin + k,
            IndexList::Stride { begin, inc, .. } => {
                let step = inc.unsigned_abs() * k;
                if *inc > 0 {
                    begin + step
                } else {
                    begin - step
                }
            }
            IndexList::List(list) => list[k],
        }
    }

    /// Verifies every selected index lies inside a dimension of size `dim`
    pub fn check(&self, dim: usize) -> Result<()> {
        match self {
            IndexList::All => Ok(()),
            IndexList::Stride { inc: 0, .. } => {
                Err(GrbError::InvalidValue("stride increment must not be zero".into()))
            }
            IndexList::List(list) => match list.iter().find(|&&i| i >= dim) {
                Some(&index) => Err(GrbError::IndexOutOfBounds { index, bound: dim }),
                None => Ok(()),
            },
            _ => {
                let n = self.len(dim);
                if n == 0 {
                    return Ok(());
                }
                // ranges and strides are monotone, so the ends bound them
                let highest = self.get(0).max(self.get(n - 1));
                if highest >= dim {
                    Err(GrbError::IndexOutOfBounds {
                        index: highest,
                        bound: dim,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Position in the list of each index of `0..dim`; the last occurrence
    /// wins for duplicated indices
    pub(crate) fn inverse(&self, dim: usize) -> Result<Vec<Option<usize>>> {
        let mut inv = try_alloc(dim, None)?;
        for k in 0..self.len(dim) {
            inv[self.get(k)] = Some(k);
        }
        Ok(inv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &IndexList, dim: usize) -> Vec<usize> {
        (0..list.len(dim)).map(|k| list.get(k)).collect()
    }

    #[test]
    fn test_lengths_and_elements() {
        assert_eq!(collect(&IndexList::All, 3), vec![0, 1, 2]);
        assert_eq!(collect(&IndexList::Range { begin: 2, end: 5 }, 9), vec![2, 3, 4]);
        assert_eq!(
            collect(&IndexList::Stride { begin: 1, end: 8, inc: 3 }, 9),
            vec![1, 4, 7]
        );
        assert_eq!(
            collect(&IndexList::Stride { begin: 8, end: 1, inc: -3 }, 9),
            vec![8, 5, 2]
        );
        assert_eq!(collect(&IndexList::List(vec![4, 0, 4]), 9), vec![4, 0, 4]);
        assert!(IndexList::Range { begin: 5, end: 5 }.is_empty(9));
    }

    #[test]
    fn test_bounds() {
        assert!(IndexList::Range { begin: 0, end: 4 }.check(4).is_ok());
        assert_eq!(
            IndexList::Range { begin: 0, end: 5 }.check(4),
            Err(GrbError::IndexOutOfBounds { index: 4, bound: 4 })
        );
        assert_eq!(
            IndexList::List(vec![1, 7]).check(4),
            Err(GrbError::IndexOutOfBounds { index: 7, bound: 4 })
        );
        assert!(IndexList::Stride { begin: 0, end: 3, inc: 0 }.check(4).is_err());
    }

    #[test]
    fn test_inverse_last_wins() {
        let inv = IndexList::List(vec![2, 0, 2]).inverse(3).unwrap();
        assert_eq!(inv, vec![Some(1), None, Some(2)]);
    }

    #[test]
    fn test_inverse_too_large() {
        let err = IndexList::All.inverse(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, GrbError::OutOfMemory { .. }));
    }
}
