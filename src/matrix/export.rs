//! Export and import as flat component arrays

use super::buffer::dense_len;
use super::{Buffer, Entry, Matrix, Sparsity, SparsityControl, Store};
use crate::config;
use crate::error::{GrbError, Result};
use crate::types::Scalar;

/// The component arrays and metadata of a matrix
///
/// Which arrays are meaningful depends on `sparsity`: `p`, `i` and `x` for
/// sparse, plus `h` for hypersparse; `b` and `x` for bitmap; `x` alone for
/// full. Unused arrays are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMatrix<T> {
    pub vlen: usize,
    pub vdim: usize,
    /// Number of vectors held (`h.len()` if hypersparse)
    pub nvec: usize,
    pub sparsity: Sparsity,
    pub is_csc: bool,
    pub nzmax: usize,
    pub p: Vec<usize>,
    pub h: Option<Vec<usize>>,
    pub i: Vec<usize>,
    pub b: Option<Vec<u8>>,
    pub x: Vec<T>,
    /// Number of entries
    pub nvals: usize,
    /// True if vectors may be unsorted
    pub jumbled: bool,
}

impl<T: Scalar> Matrix<T> {
    /// Gives up the component arrays, finishing deferred work first
    pub fn export(mut self) -> Result<ExportedMatrix<T>> {
        self.wait()?;
        let nvals = self.nvals_held();
        let (vlen, vdim, nvec, is_csc, nzmax) =
            (self.vlen, self.vdim, self.nvec(), self.is_csc, self.nzmax());
        let sparsity = self.sparsity();
        let indices = |i: Buffer<Entry>| i.iter().map(|e| e.index()).collect::<Vec<_>>();

        let (p, h, i, b, x) = match self.store {
            Store::Full { x } => (Vec::new(), None, Vec::new(), None, x.into_vec()),
            Store::Bitmap { b, x, .. } => (Vec::new(), None, Vec::new(), Some(b.into_vec()), x.into_vec()),
            Store::Sparse { p, i, x } => (p.into_vec(), None, indices(i), None, x.into_vec()),
            Store::Hypersparse { p, h, i, x } => {
                (p.into_vec(), Some(h.into_vec()), indices(i), None, x.into_vec())
            }
        };

        Ok(ExportedMatrix {
            vlen,
            vdim,
            nvec,
            sparsity,
            is_csc,
            nzmax,
            p,
            h,
            i,
            b,
            x,
            nvals,
            jumbled: false,
        })
    }

    /// Takes ownership of exported component arrays
    ///
    /// The result keeps the layout it was given and is validated before it is
    /// returned; unsorted vectors are only accepted when `jumbled` is set.
    pub fn import(e: ExportedMatrix<T>) -> Result<Matrix<T>> {
        let cfg = config::global();
        let ExportedMatrix {
            vlen,
            vdim,
            nvec,
            sparsity,
            is_csc,
            p,
            h,
            i,
            b,
            x,
            nvals,
            jumbled,
            ..
        } = e;

        let n = dense_len(vlen, vdim)?;
        let entries = |i: Vec<usize>| -> Result<Buffer<Entry>> {
            if let Some(&bad) = i.iter().find(|&&idx| idx >= vlen) {
                return Err(GrbError::IndexOutOfBounds {
                    index: bad,
                    bound: vlen,
                });
            }
            Ok(i.into_iter().map(Entry::present).collect::<Vec<_>>().into())
        };

        let store = match sparsity {
            Sparsity::Full => {
                if x.len() != n {
                    return Err(GrbError::invalid(format!(
                        "full import needs {} values, got {}",
                        n,
                        x.len()
                    )));
                }
                Store::Full { x: x.into() }
            }
            Sparsity::Bitmap => {
                let b = b.ok_or_else(|| GrbError::invalid("bitmap import without b"))?;
                Store::Bitmap {
                    b: b.into(),
                    x: x.into(),
                    nvals,
                }
            }
            Sparsity::Sparse => Store::Sparse {
                p: p.into(),
                i: entries(i)?,
                x: x.into(),
            },
            Sparsity::Hypersparse => {
                let h = h.ok_or_else(|| GrbError::invalid("hypersparse import without h"))?;
                if h.len() != nvec {
                    return Err(GrbError::invalid(format!(
                        "nvec is {} but the hyperlist holds {}",
                        nvec,
                        h.len()
                    )));
                }
                Store::Hypersparse {
                    p: p.into(),
                    h: h.into(),
                    i: entries(i)?,
                    x: x.into(),
                }
            }
        };

        let m = Matrix {
            vlen,
            vdim,
            is_csc,
            store,
            pending: None,
            nzombies: 0,
            jumbled,
            nvec_nonempty: None,
            hyper_switch: cfg.hyper_switch,
            bitmap_switch: cfg.bitmap_switch,
            control: SparsityControl::Auto,
        };
        m.check(jumbled)?;
        if m.sparsity().is_sparse_like() && m.nvals_held() != nvals {
            return Err(GrbError::invalid(format!(
                "nvals is {} but {} entries were given",
                nvals,
                m.nvals_held()
            )));
        }
        Ok(m)
    }

    /// Imports a by-column matrix from compressed column arrays
    pub fn import_csc(
        nrows: usize,
        ncols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Matrix<T>> {
        Self::import_sparse(nrows, ncols, true, col_ptr, row_idx, values)
    }

    /// Imports a by-row matrix from compressed row arrays
    pub fn import_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Matrix<T>> {
        Self::import_sparse(nrows, ncols, false, row_ptr, col_idx, values)
    }

    fn import_sparse(
        nrows: usize,
        ncols: usize,
        is_csc: bool,
        p: Vec<usize>,
        i: Vec<usize>,
        x: Vec<T>,
    ) -> Result<Matrix<T>> {
        let (vlen, vdim) = if is_csc { (nrows, ncols) } else { (ncols, nrows) };
        let nvals = p.last().copied().unwrap_or(0);
        Self::import(ExportedMatrix {
            vlen,
            vdim,
            nvec: vdim,
            sparsity: Sparsity::Sparse,
            is_csc,
            nzmax: i.len(),
            p,
            h: None,
            i,
            b: None,
            x,
            nvals,
            jumbled: false,
        })
    }
}
