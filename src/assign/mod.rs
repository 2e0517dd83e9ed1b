//! # Masked assignment
//!
//! `C<M>(I,J) = accum(C(I,J), A)` where `A` is a matrix or a scalar
//! broadcast over the region. The output is converted to bitmap first
//! (finishing any deferred work), so every variant becomes a direct update
//! of the presence and value arrays.
//!
//! [`assign`] takes a mask the size of `C`; with replace, entries of `C`
//! anywhere outside the mask are deleted. [`subassign`] takes a mask the
//! size of the region and only ever touches the region.

mod bitmap;
mod index_list;

pub use index_list::IndexList;

use crate::config::{self, burble};
use crate::descriptor::Descriptor;
use crate::error::{GrbError, Result};
use crate::ewise::mask::Mask;
use crate::matrix::{Matrix, Sparsity, Store};
use crate::ops::BinaryOp;
use crate::types::Scalar;
use bitmap::{BitmapAssign, Region, Source};

/// The right-hand side of an assignment
#[derive(Debug, Clone, Copy)]
pub enum AssignSource<'a, T: Scalar> {
    /// One value written to every cell of the region
    Scalar(T),
    /// A matrix sized `|I| x |J|`
    Matrix(&'a Matrix<T>),
}

/// `C<M>(I,J) = accum(C(I,J), source)` with a mask the size of `C`
///
/// `rows` and `cols` select the rows and columns of `C`. Without an
/// accumulator a matrix source replaces the region outright, deleting entries
/// of `C` it does not hold. With `desc.replace`, entries of `C` outside the
/// mask are deleted everywhere in `C`.
///
/// # Errors
///
/// [`GrbError::IndexOutOfBounds`] for an index outside `C`, and
/// [`GrbError::DimensionMismatch`] when the source or mask has the wrong
/// shape. `C` is unchanged on error.
#[tracing::instrument(skip_all, fields(nrows = c.nrows(), ncols = c.ncols()))]
pub fn assign<T, M>(
    c: &mut Matrix<T>,
    mask: Option<&Matrix<M>>,
    accum: Option<BinaryOp<T, T, T>>,
    source: AssignSource<'_, T>,
    rows: &IndexList,
    cols: &IndexList,
    desc: &Descriptor,
) -> Result<()>
where
    T: Scalar,
    M: Scalar,
{
    assign_region("assign", c, mask, accum, source, rows, cols, desc)
}

/// `C(I,J)<M> = accum(C(I,J), source)` with a mask the size of the region
///
/// Entries of `C` outside `I x J` are never modified, replace included.
#[tracing::instrument(skip_all, fields(nrows = c.nrows(), ncols = c.ncols()))]
pub fn subassign<T, M>(
    c: &mut Matrix<T>,
    mask: Option<&Matrix<M>>,
    accum: Option<BinaryOp<T, T, T>>,
    source: AssignSource<'_, T>,
    rows: &IndexList,
    cols: &IndexList,
    desc: &Descriptor,
) -> Result<()>
where
    T: Scalar,
    M: Scalar,
{
    assign_region("subassign", c, mask, accum, source, rows, cols, desc)
}

#[allow(clippy::too_many_arguments)]
fn assign_region<T, M>(
    name: &'static str,
    c: &mut Matrix<T>,
    mask: Option<&Matrix<M>>,
    accum: Option<BinaryOp<T, T, T>>,
    source: AssignSource<'_, T>,
    rows: &IndexList,
    cols: &IndexList,
    desc: &Descriptor,
) -> Result<()>
where
    T: Scalar,
    M: Scalar,
{
    let sub = name == "subassign";
    let (nrows, ncols) = (c.nrows(), c.ncols());
    rows.check(nrows)?;
    cols.check(ncols)?;
    let (ni, nj) = (rows.len(nrows), cols.len(ncols));

    if let AssignSource::Matrix(a) = &source {
        if (a.nrows(), a.ncols()) != (ni, nj) {
            return Err(GrbError::dims(
                name,
                format!("source is {}x{}, region is {}x{}", a.nrows(), a.ncols(), ni, nj),
            ));
        }
    }
    if let Some(m) = mask {
        let expected = if sub { (ni, nj) } else { (nrows, ncols) };
        if (m.nrows(), m.ncols()) != expected {
            return Err(GrbError::dims(
                name,
                format!(
                    "mask is {}x{}, expected {}x{}",
                    m.nrows(),
                    m.ncols(),
                    expected.0,
                    expected.1
                ),
            ));
        }
    }

    let is_csc = c.is_csc();
    let (ilist, jlist) = if is_csc { (rows, cols) } else { (cols, rows) };

    let a_oriented;
    let source = match source {
        AssignSource::Scalar(v) => Source::Scalar(v),
        AssignSource::Matrix(a) => {
            a_oriented = a.reoriented(is_csc)?;
            Source::Matrix(a_oriented.view())
        }
    };
    let m_oriented = mask.map(|m| m.reoriented(is_csc)).transpose()?;
    let mask = m_oriented
        .as_deref()
        .map(|m| Mask::new(m, desc.mask_struct, desc.mask_comp));

    burble!(
        "bitmap {}: {} {}{}",
        name,
        match (&mask, desc.mask_comp) {
            (None, false) => "noM",
            (None, true) => "!noM",
            (Some(_), false) => "M",
            (Some(_), true) => "!M",
        },
        if accum.is_some() { "accum" } else { "noaccum" },
        if desc.replace { " replace" } else { "" }
    );

    // work on a shallow copy so C is untouched if anything fails
    let mut work = c.clone();
    work.wait()?;
    work.convert_store(Sparsity::Bitmap)?;
    let (vlen, vdim) = (work.vlen, work.vdim);
    let (b, x, nvals) = match std::mem::replace(&mut work.store, Store::empty_hyper()) {
        Store::Bitmap { b, x, nvals } => (b, x, nvals),
        other => {
            return Err(GrbError::invalid(format!(
                "assignment needs a bitmap output, found {}",
                other.sparsity()
            )))
        }
    };
    let (mut b, mut x) = (b.into_vec(), x.into_vec());

    let kernel = BitmapAssign {
        region: Region::new(ilist, jlist, vlen, vdim)?,
        source,
        accum,
        mask,
        complement: desc.mask_comp,
        replace: desc.replace,
        sub,
    };
    let nthreads = config::context().nthreads_for(b.len() as f64);
    let delta = kernel.run(&mut b, &mut x, vlen, nthreads)?;
    let nvals = nvals
        .checked_add_signed(delta)
        .ok_or_else(|| GrbError::invalid("bitmap entry count went negative"))?;
    debug_assert_eq!(nvals, b.iter().filter(|&&v| v != 0).count());

    work.store = Store::Bitmap {
        b: b.into(),
        x: x.into(),
        nvals,
    };
    work.nvec_nonempty = Some(work.count_nonempty()?);
    work.conform()?;
    *c = work;
    Ok(())
}
