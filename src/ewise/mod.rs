//! # Element-wise combiner
//!
//! `C<M> = A .* B` ([`emult`], the intersection of the patterns) and
//! `C<M> = A + B` ([`ewise_add`], their union). The output layout is chosen
//! first from the operand layouts (see [`sparsity`]):
//!
//! - **full**: both operands full and no mask, computed by the dense path
//! - **bitmap**: no sparse operand, computed cell by cell
//! - **sparse/hypersparse**: computed in two passes over one set of task
//!   slices. The first counts the entries of every output vector that pass
//!   the pattern and mask tests; a cumulative sum of the counts gives each
//!   task its own output range. The second writes indices and values into
//!   those ranges.
//!
//! The output takes the orientation of `A`; `B` and the mask are re-oriented
//! if they differ.

pub(crate) mod dense;
pub(crate) mod mask;
pub(crate) mod sparsity;

use std::ops::Range;

use rayon::prelude::*;

use crate::config::{self, burble};
use crate::descriptor::Descriptor;
use crate::error::{GrbError, Result};
use crate::matrix::buffer::{dense_len, try_alloc, try_with_capacity};
use crate::matrix::{Entry, Matrix, Parts, Sparsity, Store, View};
use crate::ops::BinaryOp;
use crate::parallel;
use crate::partition::{ewise_slice, TaskList};
use crate::types::Scalar;
use crate::utils::{exclusive_scan, split_by_offsets};

use mask::Mask;

/// A mask argument meaning "no mask"
pub const NO_MASK: Option<&'static Matrix<bool>> = None;

/// How the entries of the two operands are combined
struct Combiner<X, Y, Z> {
    op: BinaryOp<X, Y, Z>,
    /// Value of an entry present only in `A`; `None` for an intersection
    only_a: Option<fn(X) -> Z>,
    /// Value of an entry present only in `B`; `None` for an intersection
    only_b: Option<fn(Y) -> Z>,
}

impl<X, Y, Z> Combiner<X, Y, Z> {
    fn is_union(&self) -> bool {
        self.only_a.is_some() && self.only_b.is_some()
    }
}

/// An output entry and where its operands live
#[derive(Debug, Clone, Copy)]
enum Hit {
    Both(usize, usize),
    OnlyA(usize),
    OnlyB(usize),
}

/// Element-wise multiply, `C<M> = A .* B`
///
/// `C(i,j) = op(A(i,j), B(i,j))` wherever both entries are present and the
/// mask allows it.
#[tracing::instrument(skip_all, fields(op = op.name()))]
pub fn emult<X, Y, Z, M>(
    mask: Option<&Matrix<M>>,
    op: BinaryOp<X, Y, Z>,
    a: &Matrix<X>,
    b: &Matrix<Y>,
    desc: &Descriptor,
) -> Result<Matrix<Z>>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
    M: Scalar,
{
    let combiner = Combiner {
        op,
        only_a: None,
        only_b: None,
    };
    ewise("emult", mask, &combiner, a, b, desc)
}

/// Element-wise add, `C<M> = A + B`
///
/// `C(i,j) = op(A(i,j), B(i,j))` where both entries are present; an entry
/// present in only one operand is copied. Only entries the mask allows are
/// kept.
#[tracing::instrument(skip_all, fields(op = op.name()))]
pub fn ewise_add<T, M>(
    mask: Option<&Matrix<M>>,
    op: BinaryOp<T, T, T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    desc: &Descriptor,
) -> Result<Matrix<T>>
where
    T: Scalar,
    M: Scalar,
{
    let combiner = Combiner {
        op,
        only_a: Some(std::convert::identity::<T> as fn(T) -> T),
        only_b: Some(std::convert::identity::<T> as fn(T) -> T),
    };
    ewise("add", mask, &combiner, a, b, desc)
}

fn ewise<X, Y, Z, M>(
    name: &'static str,
    mask: Option<&Matrix<M>>,
    combiner: &Combiner<X, Y, Z>,
    a: &Matrix<X>,
    b: &Matrix<Y>,
    desc: &Descriptor,
) -> Result<Matrix<Z>>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
    M: Scalar,
{
    let is_csc = a.is_csc();
    let a = a.oriented_operand(desc.transpose_a, is_csc)?;
    let b = b.oriented_operand(desc.transpose_b, is_csc)?;
    if (a.nrows(), a.ncols()) != (b.nrows(), b.ncols()) {
        return Err(GrbError::dims(
            name,
            format!("A is {}x{}, B is {}x{}", a.nrows(), a.ncols(), b.nrows(), b.ncols()),
        ));
    }
    let m = match mask {
        Some(m) => {
            if (m.nrows(), m.ncols()) != (a.nrows(), a.ncols()) {
                return Err(GrbError::dims(
                    name,
                    format!("mask is {}x{}, C is {}x{}", m.nrows(), m.ncols(), a.nrows(), a.ncols()),
                ));
            }
            Some(m.reoriented(is_csc)?)
        }
        None => None,
    };
    let mask = m
        .as_deref()
        .map(|m| Mask::new(m, desc.mask_struct, desc.mask_comp));

    let (av, bv) = (a.view(), b.view());
    let mask_sparsity = mask.as_ref().map(|m| m.sparsity());
    let csparsity = if combiner.is_union() {
        sparsity::add_sparsity(av.sparsity, bv.sparsity, mask_sparsity)
    } else {
        sparsity::emult_sparsity(av.sparsity, bv.sparsity, mask_sparsity)
    };
    burble!(
        "{}:({}<{}>={}{}{})",
        name,
        csparsity.letter(),
        Mask::describe(mask.as_ref()),
        av.sparsity.letter(),
        if combiner.is_union() { "+" } else { ".*" },
        bv.sparsity.letter()
    );

    let ctx = config::context();
    let (vlen, vdim) = (av.vlen, av.vdim);
    let store = match csparsity {
        Sparsity::Full => {
            let work = vlen as f64 * vdim as f64;
            let x = dense::ewise_full(av.x(), bv.x(), combiner.op, ctx.nthreads_for(work))?;
            Store::Full { x: x.into() }
        }
        Sparsity::Bitmap => {
            let work = vlen as f64 * vdim as f64;
            bitmap_kernel(&av, &bv, mask.as_ref(), combiner, ctx.nthreads_for(work))?
        }
        s => {
            let kernel = SparseKernel::new(av, bv, mask, combiner);
            kernel.run(s == Sparsity::Hypersparse, &ctx)?
        }
    };
    Matrix::with_store(vlen, vdim, is_csc, store)
}

/// Builds a bitmap result from two bitmap or full operands
fn bitmap_kernel<X, Y, Z, M>(
    a: &View<'_, X>,
    b: &View<'_, Y>,
    mask: Option<&Mask<'_, M>>,
    combiner: &Combiner<X, Y, Z>,
    nthreads: usize,
) -> Result<Store<Z>>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
    M: Scalar,
{
    let vlen = a.vlen;
    let n = dense_len(vlen, a.vdim)?;
    let mut cb = try_alloc(n, 0u8)?;
    let mut cx = try_alloc(n, Z::default())?;
    if vlen == 0 {
        return Ok(Store::Bitmap {
            b: cb.into(),
            x: cx.into(),
            nvals: 0,
        });
    }

    let nvals = parallel::install(nthreads, || {
        cb.par_chunks_mut(vlen)
            .zip(cx.par_chunks_mut(vlen))
            .enumerate()
            .map(|(j, (bj, xj))| {
                let column = mask.map(|m| m.column(j));
                let mut count = 0;
                for i in 0..vlen {
                    if let Some(column) = &column {
                        if !column.allows(i) {
                            continue;
                        }
                    }
                    let p = i + j * vlen;
                    let z = match (a.is_live(p), b.is_live(p)) {
                        (true, true) => Some(combiner.op.apply(a.value(p), b.value(p))),
                        (true, false) => combiner.only_a.map(|f| f(a.value(p))),
                        (false, true) => combiner.only_b.map(|f| f(b.value(p))),
                        (false, false) => None,
                    };
                    if let Some(z) = z {
                        bj[i] = 1;
                        xj[i] = z;
                        count += 1;
                    }
                }
                count
            })
            .sum::<usize>()
    })?;

    Ok(Store::Bitmap {
        b: cb.into(),
        x: cx.into(),
        nvals,
    })
}

/// Two-pass construction of a sparse or hypersparse result
struct SparseKernel<'a, 'c, X, Y, Z, M> {
    a: View<'a, X>,
    b: View<'a, Y>,
    mask: Option<Mask<'a, M>>,
    combiner: &'c Combiner<X, Y, Z>,
    /// Output vectors: `(j, position of j in A, position of j in B)`
    vectors: Vec<(usize, Option<usize>, Option<usize>)>,
}

impl<'a, 'c, X, Y, Z, M> SparseKernel<'a, 'c, X, Y, Z, M>
where
    X: Scalar,
    Y: Scalar,
    Z: Scalar,
    M: Scalar,
{
    fn new(
        a: View<'a, X>,
        b: View<'a, Y>,
        mask: Option<Mask<'a, M>>,
        combiner: &'c Combiner<X, Y, Z>,
    ) -> Self {
        let vectors = output_vectors(&a, &b, combiner.is_union());
        Self {
            a,
            b,
            mask,
            combiner,
            vectors,
        }
    }

    /// Calls `f` for every output entry of output vector `kc` with index in
    /// `irange`, in index order
    fn for_each_hit(&self, kc: usize, irange: Range<usize>, mut f: impl FnMut(usize, Hit)) {
        let (j, ka, kb) = self.vectors[kc];
        let (a, b) = (&self.a, &self.b);
        let column = self.mask.as_ref().map(|m| m.column(j));
        let mut emit = |i: usize, hit: Hit| {
            if column.as_ref().map_or(true, |c| c.allows(i)) {
                f(i, hit);
            }
        };

        if !self.combiner.is_union() {
            // probe the dense operand directly instead of walking it
            match (ka, kb, a.is_sparse_like(), b.is_sparse_like()) {
                (Some(ka), Some(kb), true, false) => {
                    for (i, pa) in a.live_in(ka, irange) {
                        if let Some(pb) = b.search(kb, i).filter(|&p| b.is_live(p)) {
                            emit(i, Hit::Both(pa, pb));
                        }
                    }
                    return;
                }
                (Some(ka), Some(kb), false, true) => {
                    for (i, pb) in b.live_in(kb, irange) {
                        if let Some(pa) = a.search(ka, i).filter(|&p| a.is_live(p)) {
                            emit(i, Hit::Both(pa, pb));
                        }
                    }
                    return;
                }
                (None, _, _, _) | (_, None, _, _) => return,
                _ => {}
            }
        }

        let union = self.combiner.is_union();
        let mut ai = ka
            .into_iter()
            .flat_map(|k| a.live_in(k, irange.clone()))
            .peekable();
        let mut bi = kb
            .into_iter()
            .flat_map(|k| b.live_in(k, irange.clone()))
            .peekable();
        loop {
            match (ai.peek().copied(), bi.peek().copied()) {
                (None, None) => break,
                (Some((ia, pa)), None) => {
                    if !union {
                        break;
                    }
                    ai.next();
                    emit(ia, Hit::OnlyA(pa));
                }
                (None, Some((ib, pb))) => {
                    if !union {
                        break;
                    }
                    bi.next();
                    emit(ib, Hit::OnlyB(pb));
                }
                (Some((ia, pa)), Some((ib, pb))) => {
                    if ia < ib {
                        ai.next();
                        if union {
                            emit(ia, Hit::OnlyA(pa));
                        }
                    } else if ib < ia {
                        bi.next();
                        if union {
                            emit(ib, Hit::OnlyB(pb));
                        }
                    } else {
                        ai.next();
                        bi.next();
                        emit(ia, Hit::Both(pa, pb));
                    }
                }
            }
        }
    }

    #[inline]
    fn value(&self, hit: Hit) -> Option<Z> {
        match hit {
            Hit::Both(pa, pb) => Some(self.combiner.op.apply(self.a.value(pa), self.b.value(pb))),
            Hit::OnlyA(pa) => self.combiner.only_a.map(|f| f(self.a.value(pa))),
            Hit::OnlyB(pb) => self.combiner.only_b.map(|f| f(self.b.value(pb))),
        }
    }

    fn run(&self, hyper: bool, ctx: &parallel::Context) -> Result<Store<Z>> {
        let vlen = self.a.vlen;
        let costs: Vec<usize> = self
            .vectors
            .iter()
            .map(|&(_, ka, kb)| {
                1 + ka.map_or(0, |k| self.a.range(k).len()) + kb.map_or(0, |k| self.b.range(k).len())
            })
            .collect();
        let work: usize = costs.iter().sum();
        let nthreads = ctx.nthreads_for(work as f64);
        let tasks = ewise_slice(&costs, vlen, nthreads);
        let task_range = |t: usize| tasks.tasks[t].range.clone().unwrap_or(0..vlen);

        // Phase 1: count the entries of every (task, vector)
        let counts: Vec<Vec<usize>> = parallel::run_tasks(tasks.len(), nthreads, |t| {
            tasks.tasks[t]
                .vectors()
                .map(|kc| {
                    let mut n = 0;
                    self.for_each_hit(kc, task_range(t), |_, _| n += 1);
                    n
                })
                .collect()
        })?;

        let mut vector_counts = try_alloc(self.vectors.len(), 0usize)?;
        let mut task_counts = try_with_capacity(tasks.len())?;
        for (task, counts) in tasks.iter().zip(&counts) {
            for (kc, &n) in task.vectors().zip(counts) {
                vector_counts[kc] += n;
            }
            task_counts.push(counts.iter().sum::<usize>());
        }
        let cp = exclusive_scan(&vector_counts)?;
        let task_offsets = exclusive_scan(&task_counts)?;
        let cnz = cp.last().copied().unwrap_or(0);

        // Phase 2: each task writes its own range of the output
        let mut ci = try_alloc(cnz, Entry::default())?;
        let mut cx = try_alloc(cnz, Z::default())?;
        self.fill(&tasks, &task_offsets, &mut ci, &mut cx, nthreads)?;

        let ch = if self.vectors.len() == self.a.vdim {
            None
        } else {
            Some(self.vectors.iter().map(|&(j, _, _)| j).collect())
        };
        let parts = Parts {
            p: cp,
            h: ch,
            i: ci,
            x: cx,
        };
        parts.into_store(hyper, self.a.vdim)
    }

    fn fill(
        &self,
        tasks: &TaskList,
        offsets: &[usize],
        ci: &mut [Entry],
        cx: &mut [Z],
        nthreads: usize,
    ) -> Result<()> {
        let vlen = self.a.vlen;
        let ci_pieces = split_by_offsets(ci, offsets);
        let cx_pieces = split_by_offsets(cx, offsets);
        parallel::install(nthreads, || {
            ci_pieces
                .into_par_iter()
                .zip(cx_pieces)
                .zip(tasks.tasks.par_iter())
                .for_each(|((ci, cx), task)| {
                    let irange = task.range.clone().unwrap_or(0..vlen);
                    let mut pos = 0;
                    for kc in task.vectors() {
                        self.for_each_hit(kc, irange.clone(), |i, hit| {
                            if let Some(z) = self.value(hit) {
                                ci[pos] = Entry::present(i);
                                cx[pos] = z;
                                pos += 1;
                            }
                        });
                    }
                })
        })
    }
}

/// Vectors the result may hold, each with its position in `A` and in `B`
fn output_vectors<X: Scalar, Y: Scalar>(
    a: &View<'_, X>,
    b: &View<'_, Y>,
    union: bool,
) -> Vec<(usize, Option<usize>, Option<usize>)> {
    match (a.h(), b.h()) {
        (None, None) => (0..a.vdim).map(|j| (j, Some(j), Some(j))).collect(),
        (Some(ha), None) if !union => ha
            .iter()
            .enumerate()
            .map(|(k, &j)| (j, Some(k), Some(j)))
            .collect(),
        (None, Some(hb)) if !union => hb
            .iter()
            .enumerate()
            .map(|(k, &j)| (j, Some(j), Some(k)))
            .collect(),
        (Some(_), None) | (None, Some(_)) => (0..a.vdim)
            .map(|j| (j, a.find_vector(j), b.find_vector(j)))
            .collect(),
        (Some(ha), Some(hb)) => {
            let mut out = Vec::new();
            let (mut ka, mut kb) = (0, 0);
            while ka < ha.len() || kb < hb.len() {
                let ja = ha.get(ka).copied().unwrap_or(usize::MAX);
                let jb = hb.get(kb).copied().unwrap_or(usize::MAX);
                if ja == jb {
                    out.push((ja, Some(ka), Some(kb)));
                    ka += 1;
                    kb += 1;
                } else if ja < jb {
                    if union {
                        out.push((ja, Some(ka), None));
                    }
                    ka += 1;
                } else {
                    if union {
                        out.push((jb, None, Some(kb)));
                    }
                    kb += 1;
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{DupPolicy, SparsityControl};

    fn from(nrows: usize, ncols: usize, t: &[(usize, usize, i32)], sparsity: Sparsity) -> Matrix<i32> {
        let rows: Vec<_> = t.iter().map(|e| e.0).collect();
        let cols: Vec<_> = t.iter().map(|e| e.1).collect();
        let vals: Vec<_> = t.iter().map(|e| e.2).collect();
        let mut m = Matrix::from_tuples(nrows, ncols, &rows, &cols, &vals, DupPolicy::Error).unwrap();
        m.set_sparsity_control(SparsityControl::Fixed(sparsity)).unwrap();
        m
    }

    fn triples<T: Scalar>(m: &Matrix<T>) -> Vec<(usize, usize, T)> {
        m.iter().unwrap().collect()
    }

    const LAYOUTS: [Sparsity; 4] = [
        Sparsity::Hypersparse,
        Sparsity::Sparse,
        Sparsity::Bitmap,
        Sparsity::Full,
    ];

    #[test]
    fn test_emult_all_layouts() {
        let ta = [(0, 0, 1), (0, 2, 2), (1, 1, 3), (2, 0, 4)];
        let tb = [(0, 0, 10), (1, 1, 20), (1, 2, 30), (2, 2, 40)];
        for sa in LAYOUTS {
            for sb in LAYOUTS {
                let a = from(3, 3, &ta, sa);
                let b = from(3, 3, &tb, sb);
                let c = emult(NO_MASK, BinaryOp::times(), &a, &b, &Descriptor::default()).unwrap();
                assert_eq!(triples(&c), vec![(0, 0, 10), (1, 1, 60)], "{} .* {}", sa, sb);
                c.check(false).unwrap();
            }
        }
    }

    #[test]
    fn test_add_all_layouts() {
        let ta = [(0, 0, 1), (1, 1, 3)];
        let tb = [(0, 0, 10), (1, 0, 20)];
        for sa in LAYOUTS {
            for sb in LAYOUTS {
                let a = from(2, 2, &ta, sa);
                let b = from(2, 2, &tb, sb);
                let c = ewise_add(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
                assert_eq!(triples(&c), vec![(0, 0, 11), (1, 0, 20), (1, 1, 3)], "{} + {}", sa, sb);
            }
        }
    }

    #[test]
    fn test_full_operands_take_dense_path() {
        let a = Matrix::dense(3, 4, 2.0f64).unwrap();
        let b = Matrix::dense(3, 4, 0.5f64).unwrap();
        let c = emult(NO_MASK, BinaryOp::times(), &a, &b, &Descriptor::default()).unwrap();
        assert_eq!(c.sparsity(), Sparsity::Full);
        assert_eq!(c.nvals().unwrap(), 12);
        assert_eq!(c.extract_element(2, 3).unwrap(), Some(1.0));
    }

    #[test]
    fn test_masked_emult() {
        let a = Matrix::dense(2, 2, 3i32).unwrap();
        let b = from(2, 2, &[(0, 0, 1), (0, 1, 2), (1, 1, 4)], Sparsity::Sparse);
        let m = from(2, 2, &[(0, 1, 1), (1, 1, 0)], Sparsity::Sparse);

        let c = emult(Some(&m), BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
        assert_eq!(triples(&c), vec![(0, 1, 5)]);

        let c = emult(Some(&m), BinaryOp::plus(), &a, &b, &Descriptor::new().structural()).unwrap();
        assert_eq!(triples(&c), vec![(0, 1, 5), (1, 1, 7)]);

        let c = emult(Some(&m), BinaryOp::plus(), &a, &b, &Descriptor::new().complement()).unwrap();
        assert_eq!(triples(&c), vec![(0, 0, 4), (1, 1, 7)]);
    }

    #[test]
    fn test_mixed_types_and_transpose() {
        let a = from(2, 3, &[(0, 2, 5), (1, 0, 6)], Sparsity::Sparse);
        let b = from(3, 2, &[(2, 0, 5), (0, 1, 1)], Sparsity::Sparse);
        let c = emult(NO_MASK, BinaryOp::equal(), &a, &b, &Descriptor::new().transpose_b()).unwrap();
        assert_eq!(triples(&c), vec![(0, 2, true), (1, 0, false)]);
    }

    #[test]
    fn test_hypersparse_union_and_intersection() {
        let mut a = Matrix::<i32>::new(1000, 1000);
        let mut b = Matrix::<i32>::new(1000, 1000);
        a.set_element(5, 5, 1).unwrap();
        a.set_element(900, 1, 2).unwrap();
        b.set_element(5, 5, 3).unwrap();
        b.set_element(7, 7, 4).unwrap();
        a.wait().unwrap();
        b.wait().unwrap();

        let c = emult(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
        assert_eq!(triples(&c), vec![(5, 5, 4)]);
        assert_eq!(c.sparsity(), Sparsity::Hypersparse);

        let c = ewise_add(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap();
        assert_eq!(triples(&c), vec![(5, 5, 4), (7, 7, 4), (900, 1, 2)]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Matrix::<i32>::new(2, 3);
        let b = Matrix::<i32>::new(3, 2);
        let err = emult(NO_MASK, BinaryOp::plus(), &a, &b, &Descriptor::default()).unwrap_err();
        assert!(matches!(err, GrbError::DimensionMismatch { op: "emult", .. }));
    }
}
