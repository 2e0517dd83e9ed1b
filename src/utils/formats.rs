//! Utilities for converting between our matrix and external libraries

use ndarray::Array2;
use sprs::CsMat;

use crate::error::{GrbError, Result};
use crate::matrix::{buffer, Matrix, Sparsity, Store};
use crate::types::Scalar;

impl<T: Scalar> Matrix<T> {
    /// Converts to an sprs `CsMat`, CSC for a by-column matrix and CSR
    /// otherwise
    pub fn to_sprs(&self) -> Result<CsMat<T>> {
        let mut m = self.materialized()?.into_owned();
        m.convert_store(Sparsity::Sparse)?;
        let shape = (m.nrows(), m.ncols());
        let (p, i, x) = match m.store {
            Store::Sparse { p, i, x } => (
                p.into_vec(),
                i.iter().map(|e| e.index()).collect::<Vec<_>>(),
                x.into_vec(),
            ),
            _ => return Err(GrbError::invalid("conversion to sparse failed")),
        };
        let built = if m.is_csc {
            CsMat::try_new_csc(shape, p, i, x)
        } else {
            CsMat::try_new(shape, p, i, x)
        };
        built.map_err(|(_, _, _, err)| GrbError::invalid(format!("{:?}", err)))
    }

    /// Converts an sprs `CsMat`, keeping its storage order as orientation
    pub fn from_sprs(matrix: CsMat<T>) -> Result<Matrix<T>> {
        let (nrows, ncols) = matrix.shape();
        let is_csr = matrix.is_csr();
        let (indptr, indices, data) = matrix.into_raw_storage();
        let mut m = if is_csr {
            Matrix::import_csr(nrows, ncols, indptr, indices, data)?
        } else {
            Matrix::import_csc(nrows, ncols, indptr, indices, data)?
        };
        m.conform()?;
        Ok(m)
    }

    /// Dense copy of the values, with `T::default()` where an entry is
    /// absent, and the presence of each entry
    pub fn to_dense(&self) -> Result<(Array2<T>, Array2<bool>)> {
        let m = self.materialized()?;
        let mut values = Array2::from_elem((m.nrows(), m.ncols()), T::default());
        let mut present = Array2::from_elem((m.nrows(), m.ncols()), false);
        let v = m.view();
        for k in 0..v.nvec() {
            let j = v.vector(k);
            for (i, x) in v.entries(k) {
                let (r, c) = m.unorient(i, j);
                values[[r, c]] = x;
                present[[r, c]] = true;
            }
        }
        Ok((values, present))
    }

    /// Full matrix in the default orientation holding every value of `array`
    pub fn from_dense(array: &Array2<T>) -> Result<Matrix<T>> {
        let (nrows, ncols) = array.dim();
        let mut m = Matrix::new(nrows, ncols);
        let mut x = buffer::try_alloc(buffer::dense_len(m.vlen, m.vdim)?, T::default())?;
        for ((r, c), &value) in array.indexed_iter() {
            let (i, j) = m.orient(r, c);
            x[i + j * m.vlen] = value;
        }
        m.store = Store::Full { x: x.into() };
        m.nvec_nonempty = Some(if m.vlen > 0 { m.vdim } else { 0 });
        m.conform()?;
        Ok(m)
    }
}
