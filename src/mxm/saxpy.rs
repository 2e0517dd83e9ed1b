//! Gustavson (saxpy) kernel
//!
//! Output vector `j` is `sum_k A(:,k) * B(k,j)` over the entries of vector
//! `j` of `B`. Each task owns private accumulators reused across its
//! vectors. A vector too expensive for one task is split over fine tasks by
//! ranges of its `B` entries; their partial vectors are folded afterwards.
//!
//! A mask selects one of three gather loops. With `M` or `!M` the mask
//! vector is scattered into the dense workspace first, so excluded rows are
//! skipped before any product is formed.
//!
//! Folding the partials of a split vector groups its products by task, so a
//! floating-point monoid such as `plus` may round differently than an
//! unsplit vector or a dot product would.

use rayon::prelude::*;

use super::accumulator::{prefers_sort, Accumulator, DenseAccumulator, SortAccumulator};
use super::{Factors, Multiply, Product};
use crate::config::burble;
use crate::constants::DEFAULT_SORT_ACCUMULATOR_SIZE;
use crate::error::Result;
use crate::ewise::mask::{Mask, MaskColumn};
use crate::matrix::buffer::{try_alloc, try_with_capacity};
use crate::matrix::{Entry, Parts};
use crate::ops::Monoid;
use crate::parallel::{self, Context};
use crate::partition::{saxpy_slice, Task};
use crate::types::Scalar;
use crate::utils::{exclusive_scan, split_by_offsets};

/// Entries of one output vector, or part of one, sorted by index
struct VectorOut<Z> {
    kb: usize,
    i: Vec<usize>,
    x: Vec<Z>,
}

impl<Z: Scalar> VectorOut<Z> {
    fn empty(kb: usize) -> Self {
        Self {
            kb,
            i: Vec::new(),
            x: Vec::new(),
        }
    }

    /// Folds a later partial result of the same vector into this one
    fn merge(self, later: VectorOut<Z>, add: &Monoid<Z>) -> Result<VectorOut<Z>> {
        if later.i.is_empty() {
            return Ok(self);
        }
        if self.i.is_empty() {
            return Ok(later);
        }
        let n = self.i.len() + later.i.len();
        let mut out = VectorOut {
            kb: self.kb,
            i: try_with_capacity(n)?,
            x: try_with_capacity(n)?,
        };
        let (mut p, mut q) = (0, 0);
        while p < self.i.len() || q < later.i.len() {
            let ia = self.i.get(p).copied().unwrap_or(usize::MAX);
            let ib = later.i.get(q).copied().unwrap_or(usize::MAX);
            if ia < ib {
                out.i.push(ia);
                out.x.push(self.x[p]);
                p += 1;
            } else if ib < ia {
                out.i.push(ib);
                out.x.push(later.x[q]);
                q += 1;
            } else {
                out.i.push(ia);
                out.x.push(add.add(self.x[p], later.x[q]));
                p += 1;
                q += 1;
            }
        }
        Ok(out)
    }
}

/// Feeds the products of right positions `prange` into `acc`, keeping the
/// rows `allows` accepts
#[inline]
fn gather<P, Q, Z, F, A>(
    f: &Factors<'_, P, Q, Z, F>,
    prange: std::ops::Range<usize>,
    acc: &mut A,
    allows: impl Fn(&A, usize) -> bool,
) where
    P: Scalar,
    Q: Scalar,
    Z: Scalar,
    F: Multiply<P, Q, Z>,
    A: Accumulator<Z>,
{
    let (left, right) = (&f.left, &f.right);
    for pr in prange {
        if !right.is_live(pr) {
            continue;
        }
        let Some(kk) = left.find_vector(right.index(pr)) else {
            continue;
        };
        for pl in left.range(kk) {
            if !left.is_live(pl) {
                continue;
            }
            let i = left.index(pl);
            if allows(acc, i) {
                acc.accumulate(i, f.product(pl, pr));
            }
        }
    }
}

/// Workspaces of one task
struct Workspace<Z> {
    dense: Option<DenseAccumulator<Z>>,
    sort: SortAccumulator<Z>,
    vlen: usize,
    add: Monoid<Z>,
}

impl<Z: Scalar> Workspace<Z> {
    fn new(vlen: usize, add: Monoid<Z>) -> Self {
        Self {
            dense: None,
            sort: SortAccumulator::new(DEFAULT_SORT_ACCUMULATOR_SIZE, add),
            vlen,
            add,
        }
    }

    fn dense(&mut self) -> Result<&mut DenseAccumulator<Z>> {
        let acc = match self.dense.take() {
            Some(acc) => acc,
            None => DenseAccumulator::new(self.vlen, self.add)?,
        };
        Ok(self.dense.insert(acc))
    }
}

/// Computes the part of output vector `kb` coming from right positions
/// `prange`
fn vector<P, Q, Z, F, M>(
    f: &Factors<'_, P, Q, Z, F>,
    ws: &mut Workspace<Z>,
    kb: usize,
    prange: std::ops::Range<usize>,
    flops: usize,
    column: Option<MaskColumn<'_, M>>,
    complement: bool,
) -> Result<VectorOut<Z>>
where
    P: Scalar,
    Q: Scalar,
    Z: Scalar,
    F: Multiply<P, Q, Z>,
    M: Scalar,
{
    let mut out = VectorOut::empty(kb);
    if prefers_sort(flops) {
        let acc = &mut ws.sort;
        match &column {
            None => gather(f, prange, acc, |_, _| true),
            Some(c) => gather(f, prange, acc, |_, i| c.allows(i)),
        }
        acc.extract_into(&mut out.i, &mut out.x);
        return Ok(out);
    }

    let acc = ws.dense()?;
    match (&column, complement) {
        (None, _) => gather(f, prange, acc, |_, _| true),
        (Some(c), false) => {
            acc.scatter_mask(c.set_indices());
            gather(f, prange, acc, |a, i| a.is_masked(i));
        }
        (Some(c), true) => {
            acc.scatter_mask(c.set_indices());
            gather(f, prange, acc, |a, i| !a.is_masked(i));
        }
    }
    acc.extract_into(&mut out.i, &mut out.x);
    Ok(out)
}

/// `C<M> = A*B` by Gustavson's method
pub(crate) fn saxpy<P, Q, Z, F, M>(
    f: &Factors<'_, P, Q, Z, F>,
    mask: Option<&Mask<'_, M>>,
    ctx: &Context,
) -> Result<Product<Z>>
where
    P: Scalar,
    Q: Scalar,
    Z: Scalar,
    F: Multiply<P, Q, Z>,
    M: Scalar,
{
    let (left, right) = (&f.left, &f.right);
    let (cvlen, cvdim) = (left.vlen, right.vdim);
    let bn = right.nvec();

    let left_len = |k: usize| left.find_vector(k).map_or(0, |kk| left.range(kk).len());
    let flops: Vec<usize> = (0..bn)
        .map(|kb| {
            right
                .range(kb)
                .filter(|&pr| right.is_live(pr))
                .map(|pr| left_len(right.index(pr)))
                .sum()
        })
        .collect();
    let bnnz: Vec<usize> = (0..bn).map(|kb| right.range(kb).len()).collect();
    let total: usize = flops.iter().sum();
    let nthreads = ctx.nthreads_for(total as f64);
    let tasks = saxpy_slice(&flops, &bnnz, nthreads);
    burble!(
        "saxpy: {} tasks ({} fine) on {} threads, {} flops{}",
        tasks.len(),
        tasks.nfine(),
        nthreads,
        total,
        match mask {
            None => "",
            Some(m) if m.is_complement() => ", mask !M",
            Some(_) => ", mask M",
        }
    );

    let complement = mask.map_or(false, |m| m.is_complement());
    let run_task = |task: &Task| -> Result<Vec<VectorOut<Z>>> {
        let mut ws = Workspace::new(cvlen, f.add);
        task.vectors()
            .map(|kb| {
                let column = mask.map(|m| m.column(right.vector(kb)));
                // M with an empty mask vector: nothing to compute
                if let Some(c) = &column {
                    if !complement && c.set_indices().next().is_none() {
                        return Ok(VectorOut::empty(kb));
                    }
                }
                let rrange = right.range(kb);
                let prange = match &task.range {
                    Some(r) => rrange.start + r.start..rrange.start + r.end,
                    None => rrange,
                };
                vector(f, &mut ws, kb, prange, flops[kb], column, complement)
            })
            .collect()
    };
    let results = parallel::run_tasks(tasks.len(), nthreads, |t| run_task(&tasks.tasks[t]))?;

    // fold the partial vectors of fine tasks, in task order
    let mut vectors: Vec<VectorOut<Z>> = try_with_capacity(bn)?;
    for task_out in results {
        for out in task_out? {
            match vectors.last_mut() {
                Some(last) if last.kb == out.kb => {
                    let earlier = std::mem::replace(last, VectorOut::empty(out.kb));
                    *last = earlier.merge(out, &f.add)?;
                }
                _ => vectors.push(out),
            }
        }
    }

    let counts: Vec<usize> = vectors.iter().map(|v| v.i.len()).collect();
    let cp = exclusive_scan(&counts)?;
    let cnz = cp.last().copied().unwrap_or(0);
    let mut ci = try_alloc(cnz, Entry::default())?;
    let mut cx = try_alloc(cnz, Z::default())?;
    {
        let ci_pieces = split_by_offsets(&mut ci, &cp);
        let cx_pieces = split_by_offsets(&mut cx, &cp);
        parallel::install(nthreads, || {
            ci_pieces
                .into_par_iter()
                .zip(cx_pieces)
                .zip(vectors.par_iter())
                .for_each(|((ci, cx), v)| {
                    for (e, &i) in ci.iter_mut().zip(&v.i) {
                        *e = Entry::present(i);
                    }
                    cx.copy_from_slice(&v.x);
                })
        })?;
    }

    let hyper = right.h().is_some();
    let parts = Parts {
        p: cp,
        h: right.h().map(|h| h.to_vec()),
        i: ci,
        x: cx,
    };
    Ok(Product {
        store: parts.into_store(hyper, cvdim)?,
        nzombies: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{DupPolicy, Matrix, Store};
    use crate::mxm::{Access, Straight};
    use crate::ops::BinaryOp;

    #[test]
    fn test_merge_partials() {
        let a = VectorOut { kb: 0, i: vec![0, 3], x: vec![1, 2] };
        let b = VectorOut { kb: 0, i: vec![1, 3], x: vec![10, 20] };
        let m = a.merge(b, &Monoid::plus()).unwrap();
        assert_eq!(m.i, vec![0, 1, 3]);
        assert_eq!(m.x, vec![1, 10, 22]);
    }

    #[test]
    fn test_saxpy_fine_tasks_match_sequential() {
        // one dense column of B forces fine tasks once there are threads
        let n = 600;
        let rows: Vec<usize> = (0..n).collect();
        let cols = vec![0usize; n];
        let vals = vec![1i64; n];
        let mut a = Matrix::from_tuples(n, n, &rows, &rows, &vals, DupPolicy::Error).unwrap();
        a.set_csc(true).unwrap();
        let mut b = Matrix::from_tuples(n, 1, &rows, &cols, &vals, DupPolicy::Error).unwrap();
        b.set_csc(true).unwrap();

        let run = |ctx: Context| {
            let f = Factors {
                left: a.view(),
                right: b.view(),
                mult: Straight(BinaryOp::times()),
                add: Monoid::plus(),
                access: Access::BOTH,
            };
            let out = saxpy(&f, None::<&Mask<'_, bool>>, &ctx).unwrap();
            match out.store {
                Store::Sparse { p, i, x } => (p.to_vec(), i.len(), x.iter().sum::<i64>()),
                _ => panic!("expected sparse arrays"),
            }
        };
        let seq = run(Context::sequential());
        let par = run(Context::new(4, 1.0));
        assert_eq!(seq, (vec![0, n], n, n as i64));
        assert_eq!(seq, par);
    }

    #[test]
    fn test_split_float_vector_is_repeatable() {
        // a single output entry summing n products split over fine tasks
        let n = 600;
        let rows = vec![0usize; n];
        let ks: Vec<usize> = (0..n).collect();
        let vals: Vec<f64> = (0..n).map(|k| 1.0 / (k as f64 + 3.0)).collect();
        let mut a = Matrix::from_tuples(1, n, &rows, &ks, &vals, DupPolicy::Error).unwrap();
        a.set_csc(true).unwrap();
        let mut b = Matrix::from_tuples(n, 1, &ks, &rows, &vals, DupPolicy::Error).unwrap();
        b.set_csc(true).unwrap();

        let run = |ctx: Context| {
            let f = Factors {
                left: a.view(),
                right: b.view(),
                mult: Straight(BinaryOp::times()),
                add: Monoid::plus(),
                access: Access::BOTH,
            };
            let out = saxpy(&f, None::<&Mask<'_, bool>>, &ctx).unwrap();
            match out.store {
                Store::Sparse { x, .. } | Store::Hypersparse { x, .. } => x.to_vec(),
                _ => panic!("expected sparse arrays"),
            }
        };
        let first = run(Context::new(4, 1.0));
        let second = run(Context::new(4, 1.0));
        let seq = run(Context::sequential());
        assert_eq!(first.len(), 1);
        // partials fold in task order, so the same split gives the same bits
        assert_eq!(first[0].to_bits(), second[0].to_bits());
        assert!((first[0] - seq[0]).abs() <= 1e-12 * seq[0].abs());
    }
}
