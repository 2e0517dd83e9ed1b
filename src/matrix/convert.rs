//! Conversion between layouts, layout selection, and transposition

use std::borrow::Cow;

use rayon::prelude::*;

use super::buffer::{dense_len, try_alloc, try_with_capacity};
use super::build::{build_parts, DupPolicy, Parts};
use super::{Entry, Matrix, Sparsity, SparsityControl, Store, View};
use crate::config::burble;
use crate::error::Result;
use crate::parallel;
use crate::types::Scalar;

impl<T: Scalar> Matrix<T> {
    /// Slots of every vector as sparse parts, zombies included
    pub(crate) fn to_parts(&self) -> Result<Parts<T>> {
        match &self.store {
            Store::Sparse { p, i, x } => Ok(Parts {
                p: p.to_vec(),
                h: None,
                i: i.to_vec(),
                x: x.to_vec(),
            }),
            Store::Hypersparse { p, h, i, x } => Ok(Parts {
                p: p.to_vec(),
                h: Some(h.to_vec()),
                i: i.to_vec(),
                x: x.to_vec(),
            }),
            Store::Full { .. } | Store::Bitmap { .. } => {
                let v = View::new(self);
                // Process each vector in parallel, then assemble
                let vectors: Vec<(Vec<Entry>, Vec<T>)> = parallel::install_for(v.nvals() as f64, || {
                    (0..v.nvec())
                        .into_par_iter()
                        .map(|k| v.entries(k).map(|(i, x)| (Entry::present(i), x)).unzip())
                        .collect()
                })?;

                let nnz = self.nvals_held();
                let mut p = try_with_capacity(v.nvec() + 1)?;
                let mut i = try_with_capacity(nnz)?;
                let mut x = try_with_capacity(nnz)?;
                p.push(0);
                for (vi, vx) in vectors {
                    i.extend(vi);
                    x.extend(vx);
                    p.push(i.len());
                }
                Ok(Parts { p, h: None, i, x })
            }
        }
    }

    fn to_bitmap_store(&self) -> Result<Store<T>> {
        let (vlen, vdim) = (self.vlen, self.vdim);
        let n = dense_len(vlen, vdim)?;
        match &self.store {
            Store::Full { x } => Ok(Store::Bitmap {
                b: try_alloc(n, 1u8)?.into(),
                x: x.clone(),
                nvals: n,
            }),
            Store::Bitmap { .. } => Ok(self.store.clone()),
            Store::Sparse { .. } | Store::Hypersparse { .. } => {
                let mut b = try_alloc(n, 0u8)?;
                let mut x = try_alloc(n, T::default())?;
                let v = View::new(self);
                if self.sparsity() == Sparsity::Hypersparse {
                    for k in 0..v.nvec() {
                        let offset = v.vector(k) * vlen;
                        for (i, val) in v.entries(k) {
                            b[offset + i] = 1;
                            x[offset + i] = val;
                        }
                    }
                } else if vlen > 0 {
                    parallel::install_for(n as f64, || {
                        b.par_chunks_mut(vlen)
                            .zip(x.par_chunks_mut(vlen))
                            .enumerate()
                            .for_each(|(j, (bj, xj))| {
                                for (i, val) in v.entries(j) {
                                    bj[i] = 1;
                                    xj[i] = val;
                                }
                            })
                    })?;
                }
                Ok(Store::Bitmap {
                    b: b.into(),
                    x: x.into(),
                    nvals: self.nvals_held(),
                })
            }
        }
    }

    /// Converts the layout of a finished matrix
    ///
    /// A request for full is only honored when every slot holds an entry;
    /// otherwise the matrix becomes bitmap.
    pub(crate) fn convert_store(&mut self, target: Sparsity) -> Result<()> {
        let current = self.sparsity();
        if current == target {
            return Ok(());
        }
        let n = dense_len(self.vlen, self.vdim)?;
        let store = match target {
            Sparsity::Hypersparse => self.to_parts()?.into_store(true, self.vdim)?,
            Sparsity::Sparse => self.to_parts()?.into_store(false, self.vdim)?,
            Sparsity::Bitmap => self.to_bitmap_store()?,
            Sparsity::Full if self.nvals_held() == n => match self.to_bitmap_store()? {
                Store::Bitmap { x, .. } => Store::Full { x },
                other => other,
            },
            Sparsity::Full if current == Sparsity::Bitmap => return Ok(()),
            Sparsity::Full => self.to_bitmap_store()?,
        };
        burble!("convert: {} to {} ({})", current, store.sparsity(), self.describe());
        self.store = store;
        if self.nvec_nonempty.is_none() {
            self.nvec_nonempty = Some(self.count_nonempty()?);
        }
        Ok(())
    }

    /// Converts to the given layout, finishing deferred work first
    ///
    /// The sparsity control is unchanged, so a later operation may choose a
    /// different layout again.
    pub fn convert_to(&mut self, target: Sparsity) -> Result<()> {
        self.wait()?;
        self.convert_store(target)
    }

    pub fn convert_any_to_bitmap(&mut self) -> Result<()> {
        self.convert_to(Sparsity::Bitmap)
    }

    pub fn convert_any_to_sparse(&mut self) -> Result<()> {
        self.convert_to(Sparsity::Sparse)
    }

    pub fn convert_any_to_hyper(&mut self) -> Result<()> {
        self.convert_to(Sparsity::Hypersparse)
    }

    /// Converts to full, or to bitmap while some entries are missing
    pub fn convert_any_to_full(&mut self) -> Result<()> {
        self.convert_to(Sparsity::Full)
    }

    /// Number of vectors holding at least one live entry
    pub(crate) fn count_nonempty(&self) -> Result<usize> {
        let v = View::new(self);
        parallel::install_for(v.nvec() as f64, || {
            (0..v.nvec())
                .into_par_iter()
                .filter(|&k| v.entries(k).next().is_some())
                .count()
        })
    }

    /// Number of non-empty vectors, computed if unknown
    pub fn nvec_nonempty(&mut self) -> Result<usize> {
        self.wait()?;
        match self.nvec_nonempty {
            Some(n) => Ok(n),
            None => {
                let n = self.count_nonempty()?;
                self.nvec_nonempty = Some(n);
                Ok(n)
            }
        }
    }

    fn conform_target(&mut self) -> Result<Sparsity> {
        let current = self.sparsity();
        let all_present = match self.vlen.checked_mul(self.vdim) {
            Some(n) => n > 0 && self.nvals_held() == n,
            None => false,
        };

        match self.control {
            SparsityControl::Fixed(Sparsity::Full) if all_present => Ok(Sparsity::Full),
            SparsityControl::Fixed(Sparsity::Full) => Ok(Sparsity::Bitmap),
            SparsityControl::Fixed(s) => Ok(s),
            SparsityControl::Auto => {
                if all_present {
                    return Ok(Sparsity::Full);
                }
                let cells = self.vlen as f64 * self.vdim as f64;
                if cells == 0.0 {
                    return Ok(if current.is_sparse_like() {
                        current
                    } else {
                        Sparsity::Sparse
                    });
                }
                let density = self.nvals_held() as f64 / cells;
                match current {
                    Sparsity::Full | Sparsity::Bitmap if density >= self.bitmap_switch / 2.0 => {
                        Ok(Sparsity::Bitmap)
                    }
                    Sparsity::Sparse | Sparsity::Hypersparse if density > self.bitmap_switch => {
                        Ok(Sparsity::Bitmap)
                    }
                    _ => self.sparse_or_hyper(current),
                }
            }
        }
    }

    fn sparse_or_hyper(&mut self, current: Sparsity) -> Result<Sparsity> {
        let nonempty = match self.nvec_nonempty {
            Some(n) => n,
            None => {
                let n = self.count_nonempty()?;
                self.nvec_nonempty = Some(n);
                n
            }
        } as f64;
        let switch = self.hyper_switch * self.vdim as f64;
        Ok(match current {
            Sparsity::Hypersparse if nonempty <= 2.0 * switch => Sparsity::Hypersparse,
            Sparsity::Hypersparse => Sparsity::Sparse,
            _ if nonempty < switch => Sparsity::Hypersparse,
            _ => Sparsity::Sparse,
        })
    }

    /// Re-chooses the layout according to the sparsity control
    ///
    /// With [`SparsityControl::Auto`] a matrix with every entry present is
    /// full, a sparse matrix denser than the bitmap switch becomes bitmap (and
    /// back when below half of it), and a matrix with fewer non-empty vectors
    /// than `hyper_switch * vdim` becomes hypersparse (and back when above
    /// twice that).
    pub fn conform(&mut self) -> Result<()> {
        if !self.is_finished() {
            // wait conforms once the deferred work is done
            return self.wait();
        }
        let target = self.conform_target()?;
        self.convert_store(target)
    }

    fn transposed_store(&self) -> Result<Store<T>> {
        let (vlen, vdim) = (self.vlen, self.vdim);
        let n = dense_len(vlen, vdim)?;
        match &self.store {
            Store::Full { x } => {
                let mut t = try_alloc(n, T::default())?;
                if n > 0 {
                    parallel::install_for(n as f64, || {
                        t.par_chunks_mut(vdim).enumerate().for_each(|(i, ti)| {
                            for (j, slot) in ti.iter_mut().enumerate() {
                                *slot = x[i + j * vlen];
                            }
                        })
                    })?;
                }
                Ok(Store::Full { x: t.into() })
            }
            Store::Bitmap { b, x, nvals } => {
                let mut tb = try_alloc(n, 0u8)?;
                let mut tx = try_alloc(n, T::default())?;
                if n > 0 {
                    parallel::install_for(n as f64, || {
                        tb.par_chunks_mut(vdim)
                            .zip(tx.par_chunks_mut(vdim))
                            .enumerate()
                            .for_each(|(i, (tbi, txi))| {
                                for j in 0..vdim {
                                    tbi[j] = b[i + j * vlen];
                                    txi[j] = x[i + j * vlen];
                                }
                            })
                    })?;
                }
                Ok(Store::Bitmap {
                    b: tb.into(),
                    x: tx.into(),
                    nvals: *nvals,
                })
            }
            Store::Sparse { p, i, x } => {
                let nnz = p[vdim];

                // Count entries per index
                let mut tp = try_alloc(vlen + 1, 0usize)?;
                for e in &i[..nnz] {
                    tp[e.index() + 1] += 1;
                }

                // Compute vector pointers via prefix sum
                for r in 0..vlen {
                    tp[r + 1] += tp[r];
                }

                // Fill the transposed vectors in order of the source vectors
                let mut ti = try_alloc(nnz, Entry::default())?;
                let mut tx = try_alloc(nnz, T::default())?;
                let mut next = tp.clone();
                for j in 0..vdim {
                    for pos in p[j]..p[j + 1] {
                        let r = i[pos].index();
                        let dst = next[r];
                        ti[dst] = Entry::present(j);
                        tx[dst] = x[pos];
                        next[r] += 1;
                    }
                }
                Ok(Store::Sparse {
                    p: tp.into(),
                    i: ti.into(),
                    x: tx.into(),
                })
            }
            Store::Hypersparse { .. } => {
                // a count per index would cost O(vlen); sort the tuples instead
                let v = View::new(self);
                let nnz = self.nvals_held();
                let mut new_i = try_with_capacity(nnz)?;
                let mut new_j = try_with_capacity(nnz)?;
                let mut vals = try_with_capacity(nnz)?;
                for k in 0..v.nvec() {
                    let j = v.vector(k);
                    for (i, x) in v.entries(k) {
                        new_i.push(j);
                        new_j.push(i);
                        vals.push(x);
                    }
                }
                build_parts(&new_i, &new_j, &vals, &DupPolicy::Last, false)?.into_store(true, vlen)
            }
        }
    }

    /// The transpose of this matrix, in the same orientation
    #[tracing::instrument(skip_all, fields(nrows = self.nrows(), ncols = self.ncols()))]
    pub fn transpose(&self) -> Result<Matrix<T>> {
        let m = self.materialized()?;
        let store = m.transposed_store()?;
        let mut t = Matrix {
            vlen: m.vdim,
            vdim: m.vlen,
            is_csc: m.is_csc,
            store,
            pending: None,
            nzombies: 0,
            jumbled: false,
            nvec_nonempty: None,
            hyper_switch: m.hyper_switch,
            bitmap_switch: m.bitmap_switch,
            control: m.control,
        };
        t.nvec_nonempty = Some(t.count_nonempty()?);
        t.conform()?;
        Ok(t)
    }

    /// Changes the orientation, keeping the same logical matrix
    pub fn set_csc(&mut self, is_csc: bool) -> Result<()> {
        if self.is_csc == is_csc {
            return Ok(());
        }
        self.wait()?;
        let store = self.transposed_store()?;
        self.store = store;
        std::mem::swap(&mut self.vlen, &mut self.vdim);
        self.is_csc = is_csc;
        self.nvec_nonempty = Some(self.count_nonempty()?);
        self.conform()
    }

    /// This matrix finished and in the given orientation, borrowed when
    /// nothing needs to change
    pub(crate) fn reoriented(&self, is_csc: bool) -> Result<Cow<'_, Matrix<T>>> {
        if self.is_csc == is_csc {
            return self.materialized();
        }
        let mut m = self.clone();
        m.set_csc(is_csc)?;
        Ok(Cow::Owned(m))
    }

    /// This matrix or its transpose, finished and in the given orientation
    pub(crate) fn oriented_operand(&self, transpose: bool, is_csc: bool) -> Result<Cow<'_, Matrix<T>>> {
        if !transpose {
            return self.reoriented(is_csc);
        }
        if self.is_csc != is_csc {
            // the vectors of A held by row are those of A' held by column
            let mut m = self.materialized()?.into_owned();
            m.is_csc = is_csc;
            return Ok(Cow::Owned(m));
        }
        Ok(Cow::Owned(self.transpose()?))
    }
}
