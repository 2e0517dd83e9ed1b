//! Read-only access to the vectors of a matrix, whatever its layout

use std::ops::Range;

use super::{Entry, Matrix, Sparsity, Store};
use crate::types::Scalar;

/// Borrowed view of a matrix used by the kernels
///
/// Vector `k` of the view is the `k`-th vector held, which is vector
/// `vector(k)` of the matrix; only hypersparse views skip vectors. Positions
/// returned by [`View::range`] index `x` (and `i` or `b`).
#[derive(Clone, Copy)]
pub(crate) struct View<'a, T> {
    pub vlen: usize,
    pub vdim: usize,
    pub sparsity: Sparsity,
    p: &'a [usize],
    h: Option<&'a [usize]>,
    i: &'a [Entry],
    b: Option<&'a [u8]>,
    x: &'a [T],
}

impl<'a, T: Scalar> View<'a, T> {
    pub fn new(m: &'a Matrix<T>) -> Self {
        let no_p: &[usize] = &[];
        let no_i: &[Entry] = &[];
        let (p, h, i, b, x) = match &m.store {
            Store::Full { x } => (no_p, None, no_i, None, &x[..]),
            Store::Bitmap { b, x, .. } => (no_p, None, no_i, Some(&b[..]), &x[..]),
            Store::Sparse { p, i, x } => (&p[..], None, &i[..], None, &x[..]),
            Store::Hypersparse { p, h, i, x } => (&p[..], Some(&h[..]), &i[..], None, &x[..]),
        };
        Self {
            vlen: m.vlen,
            vdim: m.vdim,
            sparsity: m.store.sparsity(),
            p,
            h,
            i,
            b,
            x,
        }
    }

    #[inline]
    pub fn is_sparse_like(&self) -> bool {
        self.sparsity.is_sparse_like()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.sparsity == Sparsity::Full
    }

    /// Number of vectors held
    #[inline]
    pub fn nvec(&self) -> usize {
        match self.h {
            Some(h) => h.len(),
            None => self.vdim,
        }
    }

    /// Index of the `k`-th vector held
    #[inline(always)]
    pub fn vector(&self, k: usize) -> usize {
        match self.h {
            Some(h) => h[k],
            None => k,
        }
    }

    /// Positions of the `k`-th vector held
    #[inline(always)]
    pub fn range(&self, k: usize) -> Range<usize> {
        if self.sparsity.is_sparse_like() {
            self.p[k]..self.p[k + 1]
        } else {
            k * self.vlen..(k + 1) * self.vlen
        }
    }

    /// Index within its vector of the slot at position `p`
    #[inline(always)]
    pub fn index(&self, p: usize) -> usize {
        if self.sparsity.is_sparse_like() {
            self.i[p].index()
        } else {
            p % self.vlen
        }
    }

    /// True if the slot at position `p` holds an entry
    #[inline(always)]
    pub fn is_live(&self, p: usize) -> bool {
        match self.sparsity {
            Sparsity::Full => true,
            Sparsity::Bitmap => self.b.map_or(false, |b| b[p] != 0),
            Sparsity::Sparse | Sparsity::Hypersparse => self.i[p].is_present(),
        }
    }

    #[inline(always)]
    pub fn value(&self, p: usize) -> T {
        self.x[p]
    }

    /// Live entries `(index, value)` of the `k`-th vector, in index order
    pub fn entries(&self, k: usize) -> impl Iterator<Item = (usize, T)> + 'a {
        let view = *self;
        view.range(k)
            .filter(move |&p| view.is_live(p))
            .map(move |p| (view.index(p), view.x[p]))
    }

    /// Positions of the `k`-th vector whose index falls in `irange`
    pub fn positions(&self, k: usize, irange: &Range<usize>) -> Range<usize> {
        let r = self.range(k);
        if self.sparsity.is_sparse_like() {
            if irange.start == 0 && irange.end >= self.vlen {
                return r;
            }
            let slots = &self.i[r.clone()];
            let lo = slots.partition_point(|e| e.index() < irange.start);
            let hi = slots.partition_point(|e| e.index() < irange.end);
            r.start + lo..r.start + hi
        } else {
            r.start + irange.start..r.start + irange.end.min(self.vlen)
        }
    }

    /// Live entries `(index, position)` of the `k`-th vector with index in
    /// `irange`, in index order
    pub fn live_in(&self, k: usize, irange: Range<usize>) -> impl Iterator<Item = (usize, usize)> + 'a {
        let view = *self;
        view.positions(k, &irange)
            .filter(move |&p| view.is_live(p))
            .map(move |p| (view.index(p), p))
    }

    /// Raw slots of the `k`-th vector; zombies included, bitmap holes skipped
    pub fn slots(&self, k: usize) -> impl Iterator<Item = (Entry, T)> + 'a {
        let view = *self;
        view.range(k).filter_map(move |p| match view.sparsity {
            Sparsity::Sparse | Sparsity::Hypersparse => Some((view.i[p], view.x[p])),
            _ if view.is_live(p) => Some((Entry::present(view.index(p)), view.x[p])),
            _ => None,
        })
    }

    /// Number of slots of the `k`-th vector (bitmap: number of entries)
    pub fn vector_nnz(&self, k: usize) -> usize {
        match self.sparsity {
            Sparsity::Bitmap => self.range(k).filter(|&p| self.is_live(p)).count(),
            _ => self.range(k).len(),
        }
    }

    /// Slot count of each vector held, as the costs used to slice work
    pub fn vector_costs(&self) -> Vec<usize> {
        match self.sparsity {
            Sparsity::Sparse | Sparsity::Hypersparse => {
                self.p.windows(2).map(|w| w[1] - w[0]).collect()
            }
            _ => vec![self.vlen; self.vdim],
        }
    }

    /// Position `k` of the held vector `j`, if it is held
    pub fn find_vector(&self, j: usize) -> Option<usize> {
        match self.h {
            Some(h) => h.binary_search(&j).ok(),
            None if j < self.vdim => Some(j),
            None => None,
        }
    }

    /// Position of index `i` within the `k`-th vector, zombie or not
    pub fn search(&self, k: usize, i: usize) -> Option<usize> {
        if self.sparsity.is_sparse_like() {
            let r = self.range(k);
            self.i[r.clone()]
                .binary_search_by_key(&i, |e| e.index())
                .ok()
                .map(|offset| r.start + offset)
        } else if i < self.vlen {
            Some(i + k * self.vlen)
        } else {
            None
        }
    }

    /// Value of entry `(i, j)` in vector coordinates, if present
    pub fn lookup(&self, i: usize, j: usize) -> Option<T> {
        let k = self.find_vector(j)?;
        let p = self.search(k, i)?;
        if self.is_live(p) {
            Some(self.x[p])
        } else {
            None
        }
    }

    /// Number of live entries
    pub fn nvals(&self) -> usize {
        match self.sparsity {
            Sparsity::Full => self.x.len(),
            Sparsity::Bitmap => self.b.map_or(0, |b| b.iter().filter(|&&v| v != 0).count()),
            _ => {
                let held = self.p.last().copied().unwrap_or(0);
                self.i[..held].iter().filter(|e| e.is_present()).count()
            }
        }
    }

    pub fn p(&self) -> &'a [usize] {
        self.p
    }

    pub fn h(&self) -> Option<&'a [usize]> {
        self.h
    }

    pub fn b(&self) -> Option<&'a [u8]> {
        self.b
    }

    pub fn x(&self) -> &'a [T] {
        self.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{DupPolicy, SparsityControl};

    fn sample() -> Matrix<i32> {
        // [1 0 2]
        // [0 0 3]
        let mut m =
            Matrix::from_tuples(2, 3, &[0, 0, 1], &[0, 2, 2], &[1, 2, 3], DupPolicy::Error).unwrap();
        m.set_csc(true).unwrap();
        m
    }

    #[test]
    fn test_sparse_view() {
        let mut m = sample();
        m.set_sparsity_control(SparsityControl::Fixed(Sparsity::Sparse)).unwrap();
        let v = m.view();
        assert_eq!(v.nvec(), 3);
        assert_eq!(v.entries(2).collect::<Vec<_>>(), vec![(0, 2), (1, 3)]);
        assert_eq!(v.entries(1).count(), 0);
        assert_eq!(v.lookup(1, 2), Some(3));
        assert_eq!(v.lookup(1, 0), None);
        assert_eq!(v.vector_costs(), vec![1, 0, 2]);
        assert_eq!(v.nvals(), 3);
        assert_eq!(v.live_in(2, 1..2).collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn test_bitmap_and_hyper_views_agree() {
        let mut m = sample();
        m.set_sparsity_control(SparsityControl::Fixed(Sparsity::Bitmap)).unwrap();
        let bitmap: Vec<_> = {
            let v = m.view();
            (0..v.nvec())
                .flat_map(|k| v.entries(k).map(move |(i, x)| (i, v.vector(k), x)))
                .collect()
        };

        m.set_sparsity_control(SparsityControl::Fixed(Sparsity::Hypersparse)).unwrap();
        let v = m.view();
        assert_eq!(v.nvec(), 2);
        assert_eq!(v.find_vector(1), None);
        let hyper: Vec<_> = (0..v.nvec())
            .flat_map(|k| v.entries(k).map(move |(i, x)| (i, v.vector(k), x)))
            .collect();
        assert_eq!(bitmap, hyper);
    }
}
