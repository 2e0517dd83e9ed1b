//! Structural validation

use super::{Matrix, Sparsity, Store, View};
use crate::error::{GrbError, Result};
use crate::types::Scalar;

impl<T: Scalar> Matrix<T> {
    /// Verifies every structural invariant of the matrix
    ///
    /// Unsorted vectors are reported as [`GrbError::Jumbled`] unless
    /// `allow_jumbled` is set; a matrix mid-pipeline may legitimately be
    /// jumbled while one crossing the public boundary may not.
    pub fn check(&self, allow_jumbled: bool) -> Result<()> {
        let (vlen, vdim) = (self.vlen, self.vdim);
        if self.jumbled && !allow_jumbled {
            return Err(GrbError::Jumbled);
        }

        match &self.store {
            Store::Full { x } => {
                self.check_dense_only()?;
                if Some(x.len()) != vlen.checked_mul(vdim) {
                    return Err(GrbError::invalid(format!(
                        "full matrix {}x{} holds {} values",
                        vlen,
                        vdim,
                        x.len()
                    )));
                }
            }
            Store::Bitmap { b, x, nvals } => {
                self.check_dense_only()?;
                let n = vlen.checked_mul(vdim);
                if Some(b.len()) != n || Some(x.len()) != n {
                    return Err(GrbError::invalid(format!(
                        "bitmap {}x{} has {} presence bytes and {} values",
                        vlen,
                        vdim,
                        b.len(),
                        x.len()
                    )));
                }
                if b.iter().any(|&cell| cell > 1) {
                    return Err(GrbError::invalid("bitmap cell other than 0 or 1"));
                }
                let count = b.iter().filter(|&&cell| cell == 1).count();
                if count != *nvals {
                    return Err(GrbError::invalid(format!(
                        "bitmap nvals is {} but {} cells are set",
                        nvals, count
                    )));
                }
            }
            Store::Sparse { p, i, x } => {
                if p.len() != vdim + 1 {
                    return Err(GrbError::invalid(format!(
                        "sparse matrix with {} vectors has {} offsets",
                        vdim,
                        p.len()
                    )));
                }
                self.check_sparse_arrays(p, i.len(), x.len())?;
            }
            Store::Hypersparse { p, h, i, x } => {
                if p.len() != h.len() + 1 {
                    return Err(GrbError::invalid(format!(
                        "hyperlist of {} vectors has {} offsets",
                        h.len(),
                        p.len()
                    )));
                }
                if h.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(GrbError::invalid("hyperlist not strictly increasing"));
                }
                if let Some(&last) = h.last() {
                    if last >= vdim {
                        return Err(GrbError::IndexOutOfBounds {
                            index: last,
                            bound: vdim,
                        });
                    }
                }
                self.check_sparse_arrays(p, i.len(), x.len())?;
            }
        }

        if self.sparsity().is_sparse_like() {
            self.check_vectors(allow_jumbled)?;
        }

        if let Some(pending) = &self.pending {
            let (pi, pj, _) = pending.tuples();
            for (&i, &j) in pi.iter().zip(pj) {
                if i >= vlen {
                    return Err(GrbError::IndexOutOfBounds { index: i, bound: vlen });
                }
                if j >= vdim {
                    return Err(GrbError::IndexOutOfBounds { index: j, bound: vdim });
                }
            }
        }

        if let Some(known) = self.nvec_nonempty {
            let actual = self.count_nonempty()?;
            if known != actual {
                return Err(GrbError::invalid(format!(
                    "nvec_nonempty is {} but {} vectors hold entries",
                    known, actual
                )));
            }
        }
        Ok(())
    }

    fn check_dense_only(&self) -> Result<()> {
        if self.nzombies > 0 || self.pending.is_some() || self.jumbled {
            return Err(GrbError::invalid(format!(
                "{} matrix carries deferred work",
                self.sparsity()
            )));
        }
        Ok(())
    }

    fn check_sparse_arrays(&self, p: &[usize], ni: usize, nx: usize) -> Result<()> {
        if p.first() != Some(&0) {
            return Err(GrbError::invalid("p[0] must be 0"));
        }
        if p.windows(2).any(|w| w[0] > w[1]) {
            return Err(GrbError::invalid("vector offsets decrease"));
        }
        let held = p.last().copied().unwrap_or(0);
        if held > ni || held > nx {
            return Err(GrbError::invalid(format!(
                "{} slots held but capacity is {} indices and {} values",
                held, ni, nx
            )));
        }
        Ok(())
    }

    fn check_vectors(&self, allow_jumbled: bool) -> Result<()> {
        let v = View::new(self);
        let mut zombies = 0;
        for k in 0..v.nvec() {
            let mut last: Option<usize> = None;
            for (e, _) in v.slots(k) {
                let i = e.index();
                if i >= self.vlen {
                    return Err(GrbError::IndexOutOfBounds {
                        index: i,
                        bound: self.vlen,
                    });
                }
                if e.is_zombie() {
                    zombies += 1;
                }
                if let Some(prev) = last {
                    if prev == i {
                        return Err(GrbError::invalid(format!(
                            "index {} repeated in vector {}",
                            i,
                            v.vector(k)
                        )));
                    }
                    if prev > i && !allow_jumbled {
                        return Err(GrbError::Jumbled);
                    }
                }
                last = Some(i);
            }
        }
        if zombies != self.nzombies {
            return Err(GrbError::invalid(format!(
                "nzombies is {} but {} slots are zombies",
                self.nzombies, zombies
            )));
        }
        if v.sparsity == Sparsity::Hypersparse && self.is_finished() {
            if let Some(k) = (0..v.nvec()).find(|&k| v.range(k).is_empty()) {
                return Err(GrbError::invalid(format!(
                    "hyperlist holds empty vector {}",
                    v.vector(k)
                )));
            }
        }
        Ok(())
    }
}
