//! Assignment into a bitmap matrix
//!
//! The output is updated in place, one vector per parallel task. Each task
//! reports how many entries it added or removed; the sum adjusts the entry
//! count, so the bitmap is never rescanned.
//!
//! The mask, accumulator and source combine into eight variants. They share
//! one loop: a [`Gate`] answers whether a cell may be written and the
//! accumulator only changes how a present cell is updated.

use rayon::prelude::*;

use super::IndexList;
use crate::error::Result;
use crate::ewise::mask::{Mask, MaskColumn};
use crate::matrix::buffer::try_alloc;
use crate::matrix::View;
use crate::ops::BinaryOp;
use crate::parallel;
use crate::types::Scalar;

/// The `I x J` region of the output, in vector coordinates
pub(crate) struct Region<'a> {
    ilist: &'a IndexList,
    pub ni: usize,
    pub nj: usize,
    /// Position in `ilist` of each output index; the last duplicate wins
    iinv: Vec<Option<usize>>,
    jinv: Vec<Option<usize>>,
}

impl<'a> Region<'a> {
    pub fn new(ilist: &'a IndexList, jlist: &'a IndexList, vlen: usize, vdim: usize) -> Result<Self> {
        Ok(Self {
            ilist,
            ni: ilist.len(vlen),
            nj: jlist.len(vdim),
            iinv: ilist.inverse(vlen)?,
            jinv: jlist.inverse(vdim)?,
        })
    }

    /// Output index targeted by `ki`, unless a later duplicate overrides it
    #[inline]
    fn owns(&self, ki: usize) -> Option<usize> {
        let i = self.ilist.get(ki);
        (self.iinv[i] == Some(ki)).then_some(i)
    }
}

/// What is written into the region
#[derive(Clone, Copy)]
pub(crate) enum Source<'a, T> {
    Scalar(T),
    /// A matrix in the output's orientation, sized `ni x nj`
    Matrix(View<'a, T>),
}

/// Reused mask scatter space of one task
struct Scratch {
    bits: Vec<bool>,
    set: Vec<usize>,
}

impl Scratch {
    fn new(len: usize) -> Result<Self> {
        Ok(Self {
            bits: try_alloc(len, false)?,
            set: Vec::new(),
        })
    }

    fn load<M: Scalar>(&mut self, column: MaskColumn<'_, M>) {
        for i in column.set_indices() {
            self.bits[i] = true;
            self.set.push(i);
        }
    }

    fn reset(&mut self) {
        for i in self.set.drain(..) {
            self.bits[i] = false;
        }
    }
}

/// Whether a cell of one vector may be written
enum Gate<'s, 'a, M> {
    /// No mask: every cell, or none when complemented
    Open(bool),
    /// Full or bitmap mask tested in place
    Positional { mask: &'s Mask<'a, M>, base: usize },
    /// Sparse mask scattered by its own pattern
    Scattered { bits: &'s [bool], complement: bool },
}

impl<M: Scalar> Gate<'_, '_, M> {
    #[inline]
    fn allows(&self, idx: usize) -> bool {
        match self {
            Gate::Open(open) => *open,
            Gate::Positional { mask, base } => mask.is_set_at(base + idx) != mask.is_complement(),
            Gate::Scattered { bits, complement } => bits[idx] != *complement,
        }
    }
}

/// One output vector and its running entry delta
struct Column<'c, T> {
    b: &'c mut [u8],
    x: &'c mut [T],
    delta: isize,
}

impl<T: Scalar> Column<'_, T> {
    #[inline]
    fn write(&mut self, i: usize, v: T, accum: Option<BinaryOp<T, T, T>>) {
        if self.b[i] == 0 {
            self.b[i] = 1;
            self.x[i] = v;
            self.delta += 1;
        } else {
            self.x[i] = match accum {
                Some(op) => op.apply(self.x[i], v),
                None => v,
            };
        }
    }

    #[inline]
    fn clear(&mut self, i: usize) {
        if self.b[i] != 0 {
            self.b[i] = 0;
            self.delta -= 1;
        }
    }
}

/// One assignment into a bitmap
pub(crate) struct BitmapAssign<'a, T, M> {
    pub region: Region<'a>,
    pub source: Source<'a, T>,
    pub accum: Option<BinaryOp<T, T, T>>,
    pub mask: Option<Mask<'a, M>>,
    /// Complement requested without a mask
    pub complement: bool,
    pub replace: bool,
    /// Mask and replace refer to the region rather than the whole output
    pub sub: bool,
}

impl<'a, T: Scalar, M: Scalar> BitmapAssign<'a, T, M> {
    /// Updates the bitmap arrays `b` and `x` of an output with vectors of
    /// length `vlen`, returning the change in the entry count
    pub fn run(&self, b: &mut [u8], x: &mut [T], vlen: usize, nthreads: usize) -> Result<isize> {
        if vlen == 0 || b.is_empty() {
            return Ok(0);
        }
        let mlen = if self.sub { self.region.ni } else { vlen };
        let scattered = self.mask.as_ref().map_or(false, |m| m.sparsity().is_sparse_like());
        let deltas: Result<Vec<isize>> = parallel::install(nthreads, || {
            b.par_chunks_mut(vlen)
                .zip(x.par_chunks_mut(vlen))
                .enumerate()
                .map_init(
                    || Scratch::new(if scattered { mlen } else { 0 }),
                    |scratch, (j, (b, x))| -> Result<isize> {
                        let scratch = scratch.as_mut().map_err(|e| e.clone())?;
                        let mut column = Column { b, x, delta: 0 };
                        self.vector(j, &mut column, scratch);
                        scratch.reset();
                        Ok(column.delta)
                    },
                )
                .collect()
        })?;
        Ok(deltas?.iter().sum())
    }

    fn gate<'s>(&'s self, mj: usize, mlen: usize, scratch: &'s mut Scratch) -> Gate<'s, 'a, M> {
        match &self.mask {
            None => Gate::Open(!self.complement),
            Some(m) if m.sparsity().is_dense_like() => Gate::Positional { mask: m, base: mj * mlen },
            Some(m) => {
                scratch.load(m.column(mj));
                Gate::Scattered {
                    bits: &scratch.bits,
                    complement: m.is_complement(),
                }
            }
        }
    }

    fn vector(&self, j: usize, column: &mut Column<'_, T>, scratch: &mut Scratch) {
        let region = &self.region;
        let kj = region.jinv[j];
        let (mj, mlen) = match (self.sub, kj) {
            (true, Some(kj)) => (kj, region.ni),
            (true, None) => return,
            (false, _) => (j, column.b.len()),
        };
        if kj.is_none() && !self.replace {
            return;
        }
        let gate = self.gate(mj, mlen, scratch);

        // the mask index of output index i
        let at = |ki: usize, i: usize| if self.sub { ki } else { i };

        if self.replace {
            if self.sub {
                for ki in 0..region.ni {
                    if let Some(i) = region.owns(ki) {
                        if !gate.allows(ki) {
                            column.clear(i);
                        }
                    }
                }
            } else {
                for i in 0..mlen {
                    if !gate.allows(i) {
                        column.clear(i);
                    }
                }
            }
        }

        let Some(kj) = kj else {
            return;
        };
        match self.source {
            Source::Scalar(v) => {
                for ki in 0..region.ni {
                    if let Some(i) = region.owns(ki) {
                        if gate.allows(at(ki, i)) {
                            column.write(i, v, self.accum);
                        }
                    }
                }
            }
            Source::Matrix(a) => {
                if self.accum.is_none() {
                    // C(I,J) = A deletes the region cells absent from A
                    for ki in 0..region.ni {
                        if let Some(i) = region.owns(ki) {
                            if gate.allows(at(ki, i)) {
                                column.clear(i);
                            }
                        }
                    }
                }
                if let Some(k) = a.find_vector(kj) {
                    for (ki, v) in a.entries(k) {
                        if let Some(i) = region.owns(ki) {
                            if gate.allows(at(ki, i)) {
                                column.write(i, v, self.accum);
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_scalar(
        b: &mut [u8],
        x: &mut [i32],
        vlen: usize,
        rows: &IndexList,
        cols: &IndexList,
        v: i32,
        accum: Option<BinaryOp<i32, i32, i32>>,
        replace: bool,
    ) -> isize {
        let vdim = b.len() / vlen;
        let kernel = BitmapAssign::<i32, bool> {
            region: Region::new(rows, cols, vlen, vdim).unwrap(),
            source: Source::Scalar(v),
            accum,
            mask: None,
            complement: false,
            replace,
            sub: false,
        };
        kernel.run(b, x, vlen, 1).unwrap()
    }

    #[test]
    fn test_scalar_write_then_accumulate() {
        let (mut b, mut x) = (vec![0u8; 4], vec![0; 4]);
        let (rows, cols) = (IndexList::List(vec![1]), IndexList::List(vec![0]));
        assert_eq!(run_scalar(&mut b, &mut x, 2, &rows, &cols, 5, None, false), 1);
        assert_eq!(b, vec![0, 1, 0, 0]);
        assert_eq!(run_scalar(&mut b, &mut x, 2, &rows, &cols, 5, Some(BinaryOp::plus()), false), 0);
        assert_eq!(x[1], 10);
    }

    #[test]
    fn test_duplicates_accumulate_once() {
        let (mut b, mut x) = (vec![0u8; 3], vec![0; 3]);
        let rows = IndexList::List(vec![2, 2, 0]);
        let delta = run_scalar(&mut b, &mut x, 3, &rows, &IndexList::All, 4, Some(BinaryOp::plus()), false);
        assert_eq!(delta, 2);
        assert_eq!(b, vec![1, 0, 1]);
        assert_eq!(x[2], 4);
    }

    #[test]
    fn test_complement_without_mask_clears_under_replace() {
        let (mut b, mut x) = (vec![1u8; 4], vec![7; 4]);
        let region_rows = IndexList::Range { begin: 0, end: 1 };
        let kernel = BitmapAssign::<i32, bool> {
            region: Region::new(&region_rows, &IndexList::All, 2, 2).unwrap(),
            source: Source::Scalar(1),
            accum: None,
            mask: None,
            complement: true,
            replace: true,
            sub: false,
        };
        assert_eq!(kernel.run(&mut b, &mut x, 2, 2).unwrap(), -4);
        assert!(b.iter().all(|&v| v == 0));
    }
}
