//! Building matrices from tuples, and single-entry access

use rayon::prelude::*;

use super::buffer::{self, try_with_capacity};
use super::{Entry, Matrix, Pending, Sparsity, Store, View};
use crate::config::{self, Mode};
use crate::error::{GrbError, Result};
use crate::ops::BinaryOp;
use crate::parallel;
use crate::types::Scalar;

/// What to do with tuples that share a coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DupPolicy<T> {
    /// Duplicates are an error
    Error,
    /// The tuple given last wins
    Last,
    /// Duplicates are combined in the order given
    Op(BinaryOp<T, T, T>),
}

impl<T: Scalar> DupPolicy<T> {
    #[inline]
    fn combine(&self, earlier: T, later: T) -> Result<T> {
        match self {
            DupPolicy::Error => Err(GrbError::InvalidValue(
                "duplicate entries are not allowed".into(),
            )),
            DupPolicy::Last => Ok(later),
            DupPolicy::Op(op) => Ok(op.apply(earlier, later)),
        }
    }
}

/// Sparse or hypersparse component arrays under construction
///
/// `h` is `None` when vector `k` is vector `k` of the matrix.
#[derive(Debug, Clone, Default)]
pub(crate) struct Parts<T> {
    pub p: Vec<usize>,
    pub h: Option<Vec<usize>>,
    pub i: Vec<Entry>,
    pub x: Vec<T>,
}

impl<T: Scalar> Parts<T> {
    pub fn nvec(&self) -> usize {
        self.p.len().saturating_sub(1)
    }

    #[inline]
    pub fn vector(&self, k: usize) -> usize {
        match &self.h {
            Some(h) => h[k],
            None => k,
        }
    }

    #[inline]
    pub fn range(&self, k: usize) -> std::ops::Range<usize> {
        self.p[k]..self.p[k + 1]
    }

    /// Number of vectors holding at least one slot
    pub fn nonempty(&self) -> usize {
        self.p.windows(2).filter(|w| w[1] > w[0]).count()
    }

    /// Store as hypersparse (empty vectors dropped) or as sparse over
    /// `vdim` vectors
    pub fn into_store(self, hyper: bool, vdim: usize) -> Result<Store<T>> {
        let Parts { p, h, i, x } = self;
        if hyper {
            let nvec = p.len().saturating_sub(1);
            let all_kept = p.windows(2).all(|w| w[1] > w[0]);
            let (p, h) = match h {
                Some(h) if all_kept => (p, h),
                h => {
                    let mut hp = try_with_capacity(nvec + 1)?;
                    let mut hh = try_with_capacity(nvec)?;
                    hp.push(0);
                    for k in 0..nvec {
                        if p[k + 1] > p[k] {
                            hh.push(h.as_ref().map_or(k, |h| h[k]));
                            hp.push(p[k + 1]);
                        }
                    }
                    (hp, hh)
                }
            };
            return Ok(Store::Hypersparse {
                p: p.into(),
                h: h.into(),
                i: i.into(),
                x: x.into(),
            });
        }

        let p = match h {
            None => p,
            Some(h) => {
                // expand the hyperlist into one offset per vector
                let mut full = buffer::try_alloc(vdim + 1, 0usize)?;
                for (k, &j) in h.iter().enumerate() {
                    full[j + 1] = p[k + 1] - p[k];
                }
                for j in 0..vdim {
                    full[j + 1] += full[j];
                }
                full
            }
        };
        Ok(Store::Sparse {
            p: p.into(),
            i: i.into(),
            x: x.into(),
        })
    }
}

/// Sort tuples given in vector coordinates and assemble them, combining
/// duplicates with `dup`
pub(crate) fn build_parts<T: Scalar>(
    i: &[usize],
    j: &[usize],
    x: &[T],
    dup: &DupPolicy<T>,
    sorted: bool,
) -> Result<Parts<T>> {
    let n = x.len();
    let mut perm: Vec<usize> = try_with_capacity(n)?;
    perm.extend(0..n);
    if !sorted {
        // the position breaks ties, so duplicates stay in the order given
        parallel::install_for(n as f64, || perm.par_sort_unstable_by_key(|&k| (j[k], i[k], k)))?;
    }

    let mut p = try_with_capacity(n + 1)?;
    let mut h: Vec<usize> = try_with_capacity(n)?;
    let mut ii: Vec<Entry> = try_with_capacity(n)?;
    let mut xx: Vec<T> = try_with_capacity(n)?;
    p.push(0);

    for &k in &perm {
        let (ik, jk) = (i[k], j[k]);
        if h.last() != Some(&jk) {
            if !h.is_empty() {
                p.push(ii.len());
            }
            h.push(jk);
        } else if ii.last().map(|e| e.index()) == Some(ik) {
            let last = xx.len() - 1;
            xx[last] = dup.combine(xx[last], x[k])?;
            continue;
        }
        ii.push(Entry::present(ik));
        xx.push(x[k]);
    }
    if !h.is_empty() {
        p.push(ii.len());
    }

    Ok(Parts {
        p,
        h: Some(h),
        i: ii,
        x: xx,
    })
}

impl<T: Scalar> Matrix<T> {
    /// Builds a matrix from `(rows[k], cols[k], vals[k])` tuples in the default
    /// orientation
    ///
    /// # Arguments
    ///
    /// * `nrows`, `ncols` - Dimensions
    /// * `rows`, `cols`, `vals` - Tuples, in any order
    /// * `dup` - How tuples sharing a coordinate are combined
    #[tracing::instrument(skip_all, fields(nrows = nrows, ncols = ncols, ntuples = vals.len()))]
    pub fn from_tuples(
        nrows: usize,
        ncols: usize,
        rows: &[usize],
        cols: &[usize],
        vals: &[T],
        dup: DupPolicy<T>,
    ) -> Result<Self> {
        if rows.len() != vals.len() || cols.len() != vals.len() {
            return Err(GrbError::InvalidValue(format!(
                "tuple arrays differ in length: {} rows, {} cols, {} values",
                rows.len(),
                cols.len(),
                vals.len()
            )));
        }

        let mut m = Self::new(nrows, ncols);
        let n = vals.len();
        let mut iv = try_with_capacity(n)?;
        let mut jv = try_with_capacity(n)?;
        for (&r, &c) in rows.iter().zip(cols) {
            m.check_bounds(r, c)?;
            let (i, j) = m.orient(r, c);
            iv.push(i);
            jv.push(j);
        }

        let parts = build_parts(&iv, &jv, vals, &dup, false)?;
        m.nvec_nonempty = Some(parts.nvec());
        m.store = parts.into_store(true, m.vdim)?;
        m.conform()?;
        Ok(m)
    }

    /// Sets entry `(row, col)` to `x`, inserting it if absent
    pub fn set_element(&mut self, row: usize, col: usize, x: T) -> Result<()> {
        self.insert(row, col, x, None)
    }

    /// Combines `x` into entry `(row, col)` with `op`, inserting it if absent
    pub fn accum_element(&mut self, row: usize, col: usize, x: T, op: BinaryOp<T, T, T>) -> Result<()> {
        self.insert(row, col, x, Some(op))
    }

    fn insert(&mut self, row: usize, col: usize, x: T, op: Option<BinaryOp<T, T, T>>) -> Result<()> {
        self.check_bounds(row, col)?;
        let mismatched = self.pending.as_ref().map_or(false, |pending| pending.op != op);
        if mismatched || self.jumbled {
            self.wait()?;
        }

        let combine = |old: T| match op {
            Some(op) => op.apply(old, x),
            None => x,
        };
        let (i, j) = self.orient(row, col);
        let vlen = self.vlen;

        if self.sparsity().is_sparse_like() {
            let slot = {
                let v = View::new(self);
                v.find_vector(j).and_then(|k| v.search(k, i))
            };
            match slot {
                Some(p) => {
                    let (ii, xs) = self.sparse_arrays_mut()?;
                    if ii[p].is_zombie() {
                        ii[p] = ii[p].revived();
                        xs[p] = x;
                        self.nzombies -= 1;
                        self.nvec_nonempty = None;
                    } else {
                        xs[p] = combine(xs[p]);
                    }
                }
                None => {
                    self.pending
                        .get_or_insert_with(|| Pending::new(op))
                        .push(i, j, x)?;
                    self.nvec_nonempty = None;
                }
            }
            return self.finish_if_blocking();
        }

        let p = i + j * vlen;
        match &mut self.store {
            Store::Full { x: xs } => {
                let xs = xs.make_mut();
                xs[p] = combine(xs[p]);
            }
            Store::Bitmap { b, x: xs, nvals } => {
                let (b, xs) = (b.make_mut(), xs.make_mut());
                if b[p] != 0 {
                    xs[p] = combine(xs[p]);
                } else {
                    b[p] = 1;
                    xs[p] = x;
                    *nvals += 1;
                    self.nvec_nonempty = None;
                }
            }
            Store::Sparse { .. } | Store::Hypersparse { .. } => {}
        }
        self.finish_if_blocking()
    }

    /// Removes entry `(row, col)` if present
    ///
    /// Entries of sparse and hypersparse matrices become zombies; a full
    /// matrix becomes bitmap.
    pub fn remove_element(&mut self, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        if self.pending.is_some() || self.jumbled {
            self.wait()?;
        }
        if self.sparsity() == Sparsity::Full {
            self.convert_store(Sparsity::Bitmap)?;
        }

        let (i, j) = self.orient(row, col);
        if self.sparsity().is_sparse_like() {
            let slot = {
                let v = View::new(self);
                v.find_vector(j).and_then(|k| v.search(k, i))
            };
            if let Some(p) = slot {
                let (ii, _) = self.sparse_arrays_mut()?;
                if ii[p].is_present() {
                    ii[p] = ii[p].killed();
                    self.nzombies += 1;
                    self.nvec_nonempty = None;
                }
            }
        } else if let Store::Bitmap { b, nvals, .. } = &mut self.store {
            let p = i + j * self.vlen;
            if b[p] != 0 {
                b.make_mut()[p] = 0;
                *nvals -= 1;
                self.nvec_nonempty = None;
            }
        }
        self.finish_if_blocking()
    }

    /// Value of entry `(row, col)`, or `None` if it is absent
    pub fn extract_element(&self, row: usize, col: usize) -> Result<Option<T>> {
        self.check_bounds(row, col)?;
        let (i, j) = self.orient(row, col);
        if self.pending.is_none() && !self.jumbled {
            // zombies are skipped by the lookup itself
            return Ok(View::new(self).lookup(i, j));
        }
        let m = self.materialized()?;
        Ok(m.view().lookup(i, j))
    }

    /// All entries as `(rows, cols, values)`, in storage order
    pub fn extract_tuples(&self) -> Result<(Vec<usize>, Vec<usize>, Vec<T>)> {
        let m = self.materialized()?;
        let v = m.view();
        let n = m.nvals_held();
        let mut rows = try_with_capacity(n)?;
        let mut cols = try_with_capacity(n)?;
        let mut vals = try_with_capacity(n)?;
        for k in 0..v.nvec() {
            let j = v.vector(k);
            for (i, x) in v.entries(k) {
                let (r, c) = m.unorient(i, j);
                rows.push(r);
                cols.push(c);
                vals.push(x);
            }
        }
        Ok((rows, cols, vals))
    }

    /// All entries as `(row, col, value)`, sorted by row then column
    pub fn iter(&self) -> Result<std::vec::IntoIter<(usize, usize, T)>> {
        let (rows, cols, vals) = self.extract_tuples()?;
        let mut triples: Vec<(usize, usize, T)> = rows
            .into_iter()
            .zip(cols)
            .zip(vals)
            .map(|((r, c), x)| (r, c, x))
            .collect();
        if self.is_csc {
            parallel::install_for(triples.len() as f64, || {
                triples.par_sort_unstable_by_key(|&(r, c, _)| (r, c))
            })?;
        }
        Ok(triples.into_iter())
    }

    pub(crate) fn sparse_arrays_mut(&mut self) -> Result<(&mut Vec<Entry>, &mut Vec<T>)> {
        match &mut self.store {
            Store::Sparse { i, x, .. } | Store::Hypersparse { i, x, .. } => {
                Ok((i.make_mut(), x.make_mut()))
            }
            _ => Err(GrbError::invalid("dense layouts have no index array")),
        }
    }

    fn finish_if_blocking(&mut self) -> Result<()> {
        if config::global().mode == Mode::Blocking {
            self.wait()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixState;

    #[test]
    fn test_build_parts_sorts_and_combines() {
        let parts = build_parts(
            &[2, 0, 2, 1],
            &[1, 1, 1, 0],
            &[1, 2, 3, 4],
            &DupPolicy::Op(BinaryOp::plus()),
            false,
        )
        .unwrap();
        assert_eq!(parts.h, Some(vec![0, 1]));
        assert_eq!(parts.p, vec![0, 1, 3]);
        assert_eq!(parts.i, vec![Entry::present(1), Entry::present(0), Entry::present(2)]);
        assert_eq!(parts.x, vec![4, 2, 4]);
    }

    #[test]
    fn test_from_tuples_duplicates() {
        let err = Matrix::from_tuples(2, 2, &[0, 0], &[1, 1], &[1, 2], DupPolicy::Error);
        assert!(matches!(err, Err(GrbError::InvalidValue(_))));

        let m = Matrix::from_tuples(2, 2, &[0, 0], &[1, 1], &[1, 2], DupPolicy::Last).unwrap();
        assert_eq!(m.extract_element(0, 1).unwrap(), Some(2));
    }

    #[test]
    fn test_from_tuples_out_of_bounds() {
        let err = Matrix::from_tuples(2, 2, &[0, 5], &[1, 1], &[1, 2], DupPolicy::Last);
        assert_eq!(err.unwrap_err(), GrbError::IndexOutOfBounds { index: 5, bound: 2 });
    }

    #[test]
    fn test_set_element_goes_pending_then_flushes() {
        let mut m = Matrix::<i32>::new(100, 100);
        m.set_element(3, 4, 7).unwrap();
        m.set_element(50, 2, 1).unwrap();
        m.set_element(3, 4, 8).unwrap();
        assert_eq!(m.state(), MatrixState::HasPending);
        assert_eq!(m.npending(), 3);
        assert_eq!(m.nvals().unwrap(), 2);
        assert_eq!(m.extract_element(3, 4).unwrap(), Some(8));

        m.wait().unwrap();
        assert_eq!(m.state(), MatrixState::Clean);
        assert_eq!(m.extract_element(3, 4).unwrap(), Some(8));
        assert_eq!(m.nvals().unwrap(), 2);
    }

    #[test]
    fn test_remove_and_revive_zombie() {
        let mut m = Matrix::from_tuples(3, 3, &[0, 1, 2], &[0, 1, 2], &[1.0, 2.0, 3.0], DupPolicy::Error)
            .unwrap();
        m.remove_element(1, 1).unwrap();
        assert_eq!(m.state(), MatrixState::HasZombies);
        assert_eq!(m.nzombies(), 1);
        assert_eq!(m.extract_element(1, 1).unwrap(), None);
        assert_eq!(m.nvals().unwrap(), 2);

        m.set_element(1, 1, 5.0).unwrap();
        assert_eq!(m.state(), MatrixState::Clean);
        assert_eq!(m.extract_element(1, 1).unwrap(), Some(5.0));
    }

    #[test]
    fn test_accum_element_combines() {
        let mut m = Matrix::<i64>::new(4, 4);
        let plus = BinaryOp::plus();
        m.accum_element(1, 2, 5, plus).unwrap();
        m.accum_element(1, 2, 5, plus).unwrap();
        m.wait().unwrap();
        assert_eq!(m.extract_element(1, 2).unwrap(), Some(10));

        // an existing entry is updated in place
        m.accum_element(1, 2, 1, plus).unwrap();
        assert_eq!(m.extract_element(1, 2).unwrap(), Some(11));
    }

    #[test]
    fn test_remove_from_full_makes_bitmap() {
        let mut m = Matrix::dense(2, 2, 1u8).unwrap();
        m.remove_element(0, 1).unwrap();
        assert_eq!(m.sparsity(), Sparsity::Bitmap);
        assert_eq!(m.nvals().unwrap(), 3);
        assert_eq!(m.extract_element(0, 1).unwrap(), None);
    }

    #[test]
    fn test_iter_is_row_major() {
        let mut m = Matrix::from_tuples(2, 2, &[1, 0, 0], &[0, 1, 0], &[3, 2, 1], DupPolicy::Error)
            .unwrap();
        m.set_csc(true).unwrap();
        let triples: Vec<_> = m.iter().unwrap().collect();
        assert_eq!(triples, vec![(0, 0, 1), (0, 1, 2), (1, 0, 3)]);
    }
}
