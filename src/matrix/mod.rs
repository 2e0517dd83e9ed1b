//! # Opaque matrix
//!
//! A [`Matrix`] is a collection of vectors. A by-column matrix stores its
//! columns as vectors, a by-row matrix its rows; `vlen` is the length of each
//! vector and `vdim` the number of vectors. Every kernel works in this vector
//! space, so row- and column-oriented matrices share one code path.
//!
//! The vectors are held in one of four layouts (see [`Sparsity`]):
//!
//! - **Full**: `x` holds all `vlen * vdim` values, entry `(i, j)` at
//!   `i + j * vlen`
//! - **Bitmap**: as full, plus a presence byte per slot in `b` and an explicit
//!   entry count
//! - **Sparse**: vector `j` occupies `p[j]..p[j+1]` of the index array `i` and
//!   the value array `x`
//! - **Hypersparse**: as sparse, but only the vectors listed in `h` are held
//!
//! Sparse and hypersparse matrices may additionally carry deferred work:
//! zombies (deleted entries still occupying their slot, see [`Entry`]) and
//! pending tuples (queued insertions). [`Matrix::wait`] finishes both.

pub mod buffer;
pub mod entry;

mod build;
mod check;
mod convert;
mod export;
mod pending;
mod view;

use std::borrow::Cow;
use std::fmt;

use num_traits::One;

use crate::config;
use crate::constants::{MAX_DISPLAY_ENTRIES_PER_VECTOR, MAX_DISPLAY_VECTORS};
use crate::error::{GrbError, Result};
use crate::types::{Scalar, Type};

pub use buffer::Buffer;
pub use build::DupPolicy;
pub(crate) use build::Parts;
pub use entry::Entry;
pub use export::ExportedMatrix;
pub(crate) use pending::Pending;
pub(crate) use view::View;

/// Physical layout of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sparsity {
    Hypersparse,
    Sparse,
    Bitmap,
    Full,
}

impl Sparsity {
    /// True for the layouts that hold an index per entry
    pub fn is_sparse_like(&self) -> bool {
        matches!(self, Sparsity::Hypersparse | Sparsity::Sparse)
    }

    /// True for the layouts addressed by position
    pub fn is_dense_like(&self) -> bool {
        matches!(self, Sparsity::Bitmap | Sparsity::Full)
    }

    /// One-letter code used in diagnostics
    pub fn letter(&self) -> char {
        match self {
            Sparsity::Hypersparse => 'H',
            Sparsity::Sparse => 'S',
            Sparsity::Bitmap => 'B',
            Sparsity::Full => 'F',
        }
    }
}

impl fmt::Display for Sparsity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sparsity::Hypersparse => "hypersparse",
            Sparsity::Sparse => "sparse",
            Sparsity::Bitmap => "bitmap",
            Sparsity::Full => "full",
        };
        f.write_str(name)
    }
}

/// How a matrix picks its layout after each operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparsityControl {
    /// Chosen from the entry count and the hyper and bitmap switches
    Auto,
    /// Always this layout; `Full` degrades to bitmap while entries are missing
    Fixed(Sparsity),
}

/// Deferred work a matrix is carrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixState {
    Clean,
    HasZombies,
    HasPending,
    HasBoth,
}

/// Component arrays of each layout
#[derive(Debug, Clone)]
pub(crate) enum Store<T> {
    Full {
        x: Buffer<T>,
    },
    Bitmap {
        b: Buffer<u8>,
        x: Buffer<T>,
        nvals: usize,
    },
    Sparse {
        p: Buffer<usize>,
        i: Buffer<Entry>,
        x: Buffer<T>,
    },
    Hypersparse {
        p: Buffer<usize>,
        h: Buffer<usize>,
        i: Buffer<Entry>,
        x: Buffer<T>,
    },
}

impl<T> Store<T> {
    pub(crate) fn sparsity(&self) -> Sparsity {
        match self {
            Store::Full { .. } => Sparsity::Full,
            Store::Bitmap { .. } => Sparsity::Bitmap,
            Store::Sparse { .. } => Sparsity::Sparse,
            Store::Hypersparse { .. } => Sparsity::Hypersparse,
        }
    }

    pub(crate) fn empty_hyper() -> Self {
        Store::Hypersparse {
            p: Buffer::from(vec![0]),
            h: Buffer::default(),
            i: Buffer::default(),
            x: Buffer::default(),
        }
    }
}

/// A sparse matrix with entries of type `T`
///
/// Cloning a matrix is a shallow copy: the component arrays are shared and
/// copied on the first write, so the clone behaves as an independent matrix.
#[derive(Clone)]
pub struct Matrix<T> {
    pub(crate) vlen: usize,
    pub(crate) vdim: usize,
    pub(crate) is_csc: bool,
    pub(crate) store: Store<T>,
    pub(crate) pending: Option<Pending<T>>,
    pub(crate) nzombies: usize,
    pub(crate) jumbled: bool,
    /// Number of vectors holding at least one entry; `None` when unknown
    pub(crate) nvec_nonempty: Option<usize>,
    pub(crate) hyper_switch: f64,
    pub(crate) bitmap_switch: f64,
    pub(crate) control: SparsityControl,
}

impl<T: Scalar> Matrix<T> {
    /// Creates an empty `nrows`-by-`ncols` matrix in the default orientation
    pub fn new(nrows: usize, ncols: usize) -> Self {
        let cfg = config::global();
        Self::empty(nrows, ncols, cfg.is_csc_default)
    }

    /// Creates an empty matrix with the given orientation
    pub fn empty(nrows: usize, ncols: usize, is_csc: bool) -> Self {
        let cfg = config::global();
        let (vlen, vdim) = if is_csc { (nrows, ncols) } else { (ncols, nrows) };
        Self {
            vlen,
            vdim,
            is_csc,
            store: Store::empty_hyper(),
            pending: None,
            nzombies: 0,
            jumbled: false,
            nvec_nonempty: Some(0),
            hyper_switch: cfg.hyper_switch,
            bitmap_switch: cfg.bitmap_switch,
            control: SparsityControl::Auto,
        }
    }

    /// Allocates a matrix in the given layout
    ///
    /// Sparse, hypersparse and bitmap matrices start without entries. A full
    /// matrix holds an entry in every slot, all equal to `T::default()`.
    /// The layout is pinned with [`SparsityControl::Fixed`].
    pub fn new_with(nrows: usize, ncols: usize, is_csc: bool, sparsity: Sparsity) -> Result<Self> {
        let mut m = Self::empty(nrows, ncols, is_csc);
        let n = buffer::dense_len(m.vlen, m.vdim)?;
        m.store = match sparsity {
            Sparsity::Hypersparse => Store::empty_hyper(),
            Sparsity::Sparse => Store::Sparse {
                p: buffer::try_alloc(m.vdim + 1, 0)?.into(),
                i: Buffer::default(),
                x: Buffer::default(),
            },
            Sparsity::Bitmap => Store::Bitmap {
                b: buffer::try_alloc(n, 0u8)?.into(),
                x: buffer::try_alloc(n, T::default())?.into(),
                nvals: 0,
            },
            Sparsity::Full => {
                m.nvec_nonempty = Some(if m.vlen > 0 { m.vdim } else { 0 });
                Store::Full {
                    x: buffer::try_alloc(n, T::default())?.into(),
                }
            }
        };
        m.control = SparsityControl::Fixed(sparsity);
        Ok(m)
    }

    /// Creates a full matrix with every entry equal to `value`
    pub fn dense(nrows: usize, ncols: usize, value: T) -> Result<Self> {
        let mut m = Self::new(nrows, ncols);
        let n = buffer::dense_len(m.vlen, m.vdim)?;
        m.store = Store::Full {
            x: buffer::try_alloc(n, value)?.into(),
        };
        m.nvec_nonempty = Some(if m.vlen > 0 { m.vdim } else { 0 });
        Ok(m)
    }

    fn wrap(vlen: usize, vdim: usize, is_csc: bool, store: Store<T>) -> Self {
        let cfg = config::global();
        Self {
            vlen,
            vdim,
            is_csc,
            store,
            pending: None,
            nzombies: 0,
            jumbled: false,
            nvec_nonempty: None,
            hyper_switch: cfg.hyper_switch,
            bitmap_switch: cfg.bitmap_switch,
            control: SparsityControl::Auto,
        }
    }

    /// Wraps newly built component arrays and chooses their layout
    pub(crate) fn with_store(vlen: usize, vdim: usize, is_csc: bool, store: Store<T>) -> Result<Self> {
        let mut m = Self::wrap(vlen, vdim, is_csc, store);
        m.nvec_nonempty = Some(m.count_nonempty()?);
        m.conform()?;
        Ok(m)
    }

    /// As [`Matrix::with_store`] for sparse arrays holding `nzombies`
    /// zombies, which are removed before the layout is chosen
    pub(crate) fn with_zombies(
        vlen: usize,
        vdim: usize,
        is_csc: bool,
        store: Store<T>,
        nzombies: usize,
    ) -> Result<Self> {
        if nzombies == 0 {
            return Self::with_store(vlen, vdim, is_csc, store);
        }
        let mut m = Self::wrap(vlen, vdim, is_csc, store);
        m.nzombies = nzombies;
        m.wait()?;
        Ok(m)
    }

    /// Creates an `n`-by-`n` identity matrix
    pub fn identity(n: usize) -> Result<Self>
    where
        T: One,
    {
        let mut m = Self::new(n, n);
        let p: Vec<usize> = (0..=n).collect();
        let i: Vec<Entry> = (0..n).map(Entry::present).collect();
        let x = buffer::try_alloc(n, T::one())?;
        m.store = Store::Sparse {
            p: p.into(),
            i: i.into(),
            x: x.into(),
        };
        m.nvec_nonempty = Some(n);
        m.conform()?;
        Ok(m)
    }

    pub fn nrows(&self) -> usize {
        if self.is_csc {
            self.vlen
        } else {
            self.vdim
        }
    }

    pub fn ncols(&self) -> usize {
        if self.is_csc {
            self.vdim
        } else {
            self.vlen
        }
    }

    /// Length of each vector
    pub fn vlen(&self) -> usize {
        self.vlen
    }

    /// Number of vectors
    pub fn vdim(&self) -> usize {
        self.vdim
    }

    /// True if the vectors are columns
    pub fn is_csc(&self) -> bool {
        self.is_csc
    }

    pub fn sparsity(&self) -> Sparsity {
        self.store.sparsity()
    }

    pub fn sparsity_control(&self) -> SparsityControl {
        self.control
    }

    pub fn hyper_switch(&self) -> f64 {
        self.hyper_switch
    }

    pub fn bitmap_switch(&self) -> f64 {
        self.bitmap_switch
    }

    /// Element type descriptor
    pub fn type_info(&self) -> Type {
        Type::of::<T>()
    }

    /// Number of vectors held explicitly
    pub fn nvec(&self) -> usize {
        match &self.store {
            Store::Hypersparse { h, .. } => h.len(),
            _ => self.vdim,
        }
    }

    /// Capacity of the index and value arrays
    pub fn nzmax(&self) -> usize {
        match &self.store {
            Store::Full { x } | Store::Bitmap { x, .. } => x.len(),
            Store::Sparse { i, .. } | Store::Hypersparse { i, .. } => i.len(),
        }
    }

    /// Number of slots in use, zombies included
    pub(crate) fn nnz_held(&self) -> usize {
        match &self.store {
            Store::Full { x } => x.len(),
            Store::Bitmap { nvals, .. } => *nvals,
            Store::Sparse { p, .. } | Store::Hypersparse { p, .. } => {
                p.last().copied().unwrap_or(0)
            }
        }
    }

    /// Number of live entries, ignoring pending tuples
    pub(crate) fn nvals_held(&self) -> usize {
        self.nnz_held() - self.nzombies
    }

    /// Number of entries
    ///
    /// Pending tuples may duplicate existing entries, so a matrix carrying
    /// them is counted on a flushed copy; the matrix itself is unchanged.
    pub fn nvals(&self) -> Result<usize> {
        if self.pending.is_some() {
            return Ok(self.materialized()?.nvals_held());
        }
        Ok(self.nvals_held())
    }

    pub fn nzombies(&self) -> usize {
        self.nzombies
    }

    /// Number of queued insertions
    pub fn npending(&self) -> usize {
        self.pending.as_ref().map_or(0, |pending| pending.len())
    }

    pub fn is_jumbled(&self) -> bool {
        self.jumbled
    }

    pub fn state(&self) -> MatrixState {
        match (self.nzombies > 0, self.pending.is_some()) {
            (false, false) => MatrixState::Clean,
            (true, false) => MatrixState::HasZombies,
            (false, true) => MatrixState::HasPending,
            (true, true) => MatrixState::HasBoth,
        }
    }

    /// True if no deferred work is outstanding
    pub(crate) fn is_finished(&self) -> bool {
        self.nzombies == 0 && self.pending.is_none() && !self.jumbled
    }

    /// True if any component array is shared with another matrix
    pub fn is_shallow(&self) -> bool {
        match &self.store {
            Store::Full { x } => x.is_shared(),
            Store::Bitmap { b, x, .. } => b.is_shared() || x.is_shared(),
            Store::Sparse { p, i, x } => p.is_shared() || i.is_shared() || x.is_shared(),
            Store::Hypersparse { p, h, i, x } => {
                p.is_shared() || h.is_shared() || i.is_shared() || x.is_shared()
            }
        }
    }

    /// A copy sharing every component array with this matrix
    ///
    /// The arrays are copied lazily, by whichever matrix writes first.
    pub fn shallow_clone(&self) -> Self {
        self.clone()
    }

    /// A copy owning its own component arrays
    pub fn dup(&self) -> Self {
        let mut m = self.clone();
        m.store = match &self.store {
            Store::Full { x } => Store::Full { x: x.to_vec().into() },
            Store::Bitmap { b, x, nvals } => Store::Bitmap {
                b: b.to_vec().into(),
                x: x.to_vec().into(),
                nvals: *nvals,
            },
            Store::Sparse { p, i, x } => Store::Sparse {
                p: p.to_vec().into(),
                i: i.to_vec().into(),
                x: x.to_vec().into(),
            },
            Store::Hypersparse { p, h, i, x } => Store::Hypersparse {
                p: p.to_vec().into(),
                h: h.to_vec().into(),
                i: i.to_vec().into(),
                x: x.to_vec().into(),
            },
        };
        m
    }

    /// Removes all entries, keeping dimensions, orientation and settings
    pub fn clear(&mut self) -> Result<()> {
        self.store = Store::empty_hyper();
        self.pending = None;
        self.nzombies = 0;
        self.jumbled = false;
        self.nvec_nonempty = Some(0);
        self.conform()
    }

    pub fn set_hyper_switch(&mut self, hyper_switch: f64) -> Result<()> {
        if !(hyper_switch >= 0.0) {
            return Err(GrbError::InvalidValue(format!(
                "hyper_switch {} must be non-negative",
                hyper_switch
            )));
        }
        self.hyper_switch = hyper_switch;
        self.conform()
    }

    pub fn set_bitmap_switch(&mut self, bitmap_switch: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&bitmap_switch) {
            return Err(GrbError::InvalidValue(format!(
                "bitmap_switch {} outside [0, 1]",
                bitmap_switch
            )));
        }
        self.bitmap_switch = bitmap_switch;
        self.conform()
    }

    /// Sets how the layout is chosen and applies it
    pub fn set_sparsity_control(&mut self, control: SparsityControl) -> Result<()> {
        self.control = control;
        self.conform()
    }

    /// Vector coordinates `(i, j)` of the entry at `(row, col)`
    #[inline]
    pub(crate) fn orient(&self, row: usize, col: usize) -> (usize, usize) {
        if self.is_csc {
            (row, col)
        } else {
            (col, row)
        }
    }

    /// `(row, col)` of the entry at vector coordinates `(i, j)`
    #[inline]
    pub(crate) fn unorient(&self, i: usize, j: usize) -> (usize, usize) {
        if self.is_csc {
            (i, j)
        } else {
            (j, i)
        }
    }

    pub(crate) fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.nrows() {
            return Err(GrbError::IndexOutOfBounds {
                index: row,
                bound: self.nrows(),
            });
        }
        if col >= self.ncols() {
            return Err(GrbError::IndexOutOfBounds {
                index: col,
                bound: self.ncols(),
            });
        }
        Ok(())
    }

    /// This matrix with all deferred work finished
    ///
    /// Borrows the matrix when it is already finished; otherwise flushes a
    /// shallow copy, leaving `self` untouched.
    pub(crate) fn materialized(&self) -> Result<Cow<'_, Matrix<T>>> {
        if self.is_finished() {
            return Ok(Cow::Borrowed(self));
        }
        let mut m = self.clone();
        m.wait()?;
        Ok(Cow::Owned(m))
    }

    /// Read-only view for kernels; the matrix must be finished
    pub(crate) fn view(&self) -> View<'_, T> {
        debug_assert!(self.is_finished());
        View::new(self)
    }

    /// Short description used in diagnostics, e.g. `S 3x3`
    pub(crate) fn describe(&self) -> String {
        format!(
            "{}{} {}x{}",
            self.sparsity().letter(),
            if self.is_csc { "" } else { "(r)" },
            self.nrows(),
            self.ncols()
        )
    }
}

impl<T: Scalar> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix<{}> {{", Type::of::<T>())?;
        writeln!(f, "  dimensions: {} × {}", self.nrows(), self.ncols())?;
        writeln!(
            f,
            "  layout: {} by {}",
            self.sparsity(),
            if self.is_csc { "column" } else { "row" }
        )?;
        writeln!(
            f,
            "  entries: {} held, {} zombies, {} pending{}",
            self.nnz_held(),
            self.nzombies,
            self.npending(),
            if self.jumbled { ", jumbled" } else { "" }
        )?;

        let view = View::new(self);
        let max_vectors = MAX_DISPLAY_VECTORS.min(view.nvec());

        if max_vectors > 0 {
            writeln!(f, "  content sample:")?;

            for k in 0..max_vectors {
                write!(f, "    vector {}: ", view.vector(k))?;
                let entries: Vec<(Entry, T)> = view.slots(k).collect();

                if entries.is_empty() {
                    writeln!(f, "(empty)")?;
                } else {
                    let shown = MAX_DISPLAY_ENTRIES_PER_VECTOR.min(entries.len());
                    for (e, x) in &entries[..shown] {
                        write!(f, "({:?}, {:?}) ", e, x)?;
                    }
                    if entries.len() > shown {
                        write!(f, "... ({} more)", entries.len() - shown)?;
                    }
                    writeln!(f)?;
                }
            }

            if view.nvec() > max_vectors {
                writeln!(f, "    ... ({} more vectors)", view.nvec() - max_vectors)?;
            }
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_matrix() {
        let m = Matrix::<f64>::empty(4, 5, true);
        assert_eq!(m.nrows(), 4);
        assert_eq!(m.ncols(), 5);
        assert_eq!(m.vlen(), 4);
        assert_eq!(m.vdim(), 5);
        assert_eq!(m.sparsity(), Sparsity::Hypersparse);
        assert_eq!(m.nvals().unwrap(), 0);
        assert_eq!(m.state(), MatrixState::Clean);
    }

    #[test]
    fn test_by_row_orientation() {
        let m = Matrix::<i32>::empty(4, 5, false);
        assert_eq!(m.vlen(), 5);
        assert_eq!(m.vdim(), 4);
        assert_eq!(m.orient(1, 3), (3, 1));
        assert_eq!(m.unorient(3, 1), (1, 3));
    }

    #[test]
    fn test_new_with_layouts() {
        let m = Matrix::<u8>::new_with(3, 2, true, Sparsity::Bitmap).unwrap();
        assert_eq!(m.sparsity(), Sparsity::Bitmap);
        assert_eq!(m.nvals().unwrap(), 0);
        assert_eq!(m.nzmax(), 6);

        let m = Matrix::<u8>::new_with(3, 2, true, Sparsity::Full).unwrap();
        assert_eq!(m.nvals().unwrap(), 6);

        let m = Matrix::<u8>::new_with(3, 2, false, Sparsity::Sparse).unwrap();
        assert_eq!(m.nvec(), 3);
        assert_eq!(m.nvals().unwrap(), 0);
    }

    #[test]
    fn test_identity() {
        let m = Matrix::<i32>::identity(3).unwrap();
        assert_eq!(m.nvals().unwrap(), 3);
        assert_eq!(m.sparsity(), Sparsity::Sparse);
        assert_eq!(m.extract_element(1, 1).unwrap(), Some(1));
        assert_eq!(m.extract_element(0, 1).unwrap(), None);
    }

    #[test]
    fn test_shallow_copy() {
        let a = Matrix::<f32>::dense(2, 2, 1.5).unwrap();
        assert!(!a.dup().is_shallow());
        let mut b = a.shallow_clone();
        assert!(a.is_shallow());
        b.set_element(0, 0, 9.0).unwrap();
        assert_eq!(a.extract_element(0, 0).unwrap(), Some(1.5));
        assert_eq!(b.extract_element(0, 0).unwrap(), Some(9.0));
    }

    #[test]
    fn test_debug_output() {
        let m = Matrix::<i64>::identity(2).unwrap();
        let s = format!("{:?}", m);
        assert!(s.contains("dimensions: 2 × 2"));
        assert!(s.contains("vector 0"));
    }
}
