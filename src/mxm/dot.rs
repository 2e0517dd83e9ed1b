//! Inner-product kernels
//!
//! The left factor here is `A'`: its vector `ka` is row `ka` of `A`, so
//! cell `(ka, kb)` of the result is the merge of left vector `ka` with right
//! vector `kb`. A monoid with a terminal value stops the merge as soon as the
//! running value reaches it.

use rayon::prelude::*;

use super::{Factors, Multiply, Product};
use crate::error::{GrbError, Result};
use crate::ewise::mask::Mask;
use crate::matrix::buffer::{dense_len, try_alloc};
use crate::matrix::{Entry, Matrix, Parts, Store, View};
use crate::parallel::{self, Context};
use crate::partition::{dot_slice_counts, ewise_slice, pslice};
use crate::types::Scalar;

/// `C(ka, kb) = add_k left(k, ka) * right(k, kb)`, or `None` when the two
/// vectors share no index
pub(crate) fn dot<P, Q, Z, F>(f: &Factors<'_, P, Q, Z, F>, ka: usize, kb: usize) -> Option<Z>
where
    P: Scalar,
    Q: Scalar,
    Z: Scalar,
    F: Multiply<P, Q, Z>,
{
    let (l, r) = (&f.left, &f.right);
    let mut cij: Option<Z> = None;
    // folds one product in; true once the value can no longer change
    let mut fold = |z: Z| {
        let v = match cij {
            Some(c) => f.add.add(c, z),
            None => z,
        };
        cij = Some(v);
        f.add.is_terminal(&v)
    };

    let (lr, rr) = (l.range(ka), r.range(kb));
    match (l.is_sparse_like(), r.is_sparse_like()) {
        (true, true) => {
            let (mut pl, mut pr) = (lr.start, rr.start);
            while pl < lr.end && pr < rr.end {
                let (il, ir) = (l.index(pl), r.index(pr));
                if il < ir {
                    pl += 1;
                } else if ir < il {
                    pr += 1;
                } else {
                    if l.is_live(pl) && r.is_live(pr) && fold(f.product(pl, pr)) {
                        break;
                    }
                    pl += 1;
                    pr += 1;
                }
            }
        }
        (true, false) => {
            for (k, pl) in l.live_in(ka, 0..l.vlen) {
                let pr = rr.start + k;
                if r.is_live(pr) && fold(f.product(pl, pr)) {
                    break;
                }
            }
        }
        (false, true) => {
            for (k, pr) in r.live_in(kb, 0..r.vlen) {
                let pl = lr.start + k;
                if l.is_live(pl) && fold(f.product(pl, pr)) {
                    break;
                }
            }
        }
        (false, false) => {
            for (pl, pr) in lr.zip(rr) {
                if l.is_live(pl) && r.is_live(pr) && fold(f.product(pl, pr)) {
                    break;
                }
            }
        }
    }
    cij
}

/// Slice boundaries over the vectors of `v`, balanced by entry count when
/// `v` is sparse
fn vector_bounds<T: Scalar>(v: &View<'_, T>, nslices: usize) -> Vec<usize> {
    let nslices = nslices.clamp(1, v.nvec().max(1));
    if v.is_sparse_like() {
        pslice(v.p(), nslices)
    } else {
        let nvec = v.nvec();
        (0..=nslices).map(|t| t * nvec / nslices).collect()
    }
}

/// Part of one result column owned by a task: cells `ka0..` of column `kb`
struct Piece<'c, Z> {
    kb: usize,
    ka0: usize,
    b: &'c mut [u8],
    x: &'c mut [Z],
}

/// `C<M> = A'*B` into a bitmap
///
/// The bitmap spans the vectors held by both factors. When either factor is
/// hypersparse that packed bitmap is unpacked into sparse vectors whose
/// empty cells are zombies.
pub(crate) fn dot2<P, Q, Z, F, M>(
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
    let (an, bn) = (left.nvec(), right.nvec());
    let cvdim = right.vdim;
    let packed = left.h().is_some() || right.h().is_some();
    let ncells = dense_len(an, bn)?;
    if an == 0 || bn == 0 {
        return Ok(Product {
            store: Store::Sparse {
                p: try_alloc(cvdim + 1, 0usize)?.into(),
                i: Vec::new().into(),
                x: Vec::new().into(),
            },
            nzombies: 0,
        });
    }

    let work = ncells as f64 + (left.nvals() + right.nvals()) as f64;
    let nthreads = ctx.nthreads_for(work);
    let (naslice, nbslice) = dot_slice_counts(an, bn, nthreads);
    let abounds = vector_bounds(left, naslice);
    let bbounds = vector_bounds(right, nbslice);
    let (naslice, nbslice) = (abounds.len() - 1, bbounds.len() - 1);

    let mut cb = try_alloc(ncells, 0u8)?;
    let mut cx = try_alloc(ncells, Z::default())?;

    // task (at, bt) owns rows abounds[at].. of columns bbounds[bt]..
    let mut tasks: Vec<Vec<Piece<'_, Z>>> = (0..naslice * nbslice).map(|_| Vec::new()).collect();
    let mut columns = cb.chunks_mut(an).zip(cx.chunks_mut(an));
    for bt in 0..nbslice {
        for kb in bbounds[bt]..bbounds[bt + 1] {
            let Some((mut bcol, mut xcol)) = columns.next() else {
                break;
            };
            for at in 0..naslice {
                let len = abounds[at + 1] - abounds[at];
                let (bh, bt_rest) = std::mem::take(&mut bcol).split_at_mut(len);
                let (xh, xt_rest) = std::mem::take(&mut xcol).split_at_mut(len);
                tasks[bt * naslice + at].push(Piece {
                    kb,
                    ka0: abounds[at],
                    b: bh,
                    x: xh,
                });
                bcol = bt_rest;
                xcol = xt_rest;
            }
        }
    }

    let nvals: usize = parallel::install(nthreads, || {
        tasks
            .into_par_iter()
            .map(|pieces| {
                let mut count = 0;
                for piece in pieces {
                    let column = mask.map(|m| m.column(right.vector(piece.kb)));
                    for (off, (b, x)) in piece.b.iter_mut().zip(piece.x.iter_mut()).enumerate() {
                        let ka = piece.ka0 + off;
                        if let Some(column) = &column {
                            if !column.allows(left.vector(ka)) {
                                continue;
                            }
                        }
                        if let Some(z) = dot(f, ka, piece.kb) {
                            *b = 1;
                            *x = z;
                            count += 1;
                        }
                    }
                }
                count
            })
            .sum()
    })?;

    if !packed {
        return Ok(Product {
            store: Store::Bitmap {
                b: cb.into(),
                x: cx.into(),
                nvals,
            },
            nzombies: 0,
        });
    }

    // unpack: every held right vector gets one slot per held left vector
    let p: Vec<usize> = (0..=bn).map(|kb| kb * an).collect();
    let mut ci = try_alloc(ncells, Entry::default())?;
    parallel::install(nthreads, || {
        ci.par_chunks_mut(an)
            .zip(cb.par_chunks(an))
            .for_each(|(icol, bcol)| {
                for (ka, (e, &b)) in icol.iter_mut().zip(bcol).enumerate() {
                    let i = left.vector(ka);
                    *e = if b != 0 { Entry::present(i) } else { Entry::zombie(i) };
                }
            })
    })?;
    let hyper = right.h().is_some();
    let parts = Parts {
        p,
        h: right.h().map(|h| h.to_vec()),
        i: ci,
        x: cx,
    };
    Ok(Product {
        store: parts.into_store(hyper, cvdim)?,
        nzombies: ncells - nvals,
    })
}

/// `C<M> = A'*B` restricted to the pattern of a sparse mask
///
/// `C` starts as a copy of the mask's pattern, sharing its vector arrays.
/// Cells the mask does not set, and cells with no contribution, become
/// zombies.
pub(crate) fn dot3<P, Q, Z, F, M>(
    f: &Factors<'_, P, Q, Z, F>,
    m: &Matrix<M>,
    structural: bool,
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
    let mask = Mask::new(m, structural, false);
    let mv = *mask.view();
    let (p, h) = match &m.store {
        Store::Sparse { p, .. } => (p.clone(), None),
        Store::Hypersparse { p, h, .. } => (p.clone(), Some(h.clone())),
        _ => return Err(GrbError::invalid("dot3 requires a sparse mask")),
    };
    let mnz = p.last().copied().unwrap_or(0);

    let costs = mv.vector_costs();
    let nthreads = ctx.nthreads_for(mnz as f64 * (left.vlen.max(1)) as f64);
    let tasks = ewise_slice(&costs, mv.vlen, nthreads);
    let ranges: Vec<std::ops::Range<usize>> = tasks
        .iter()
        .map(|t| match &t.range {
            Some(irange) => mv.positions(t.kfirst, irange),
            None => p[t.kfirst]..p[t.klast],
        })
        .collect();
    let offsets: Vec<usize> = ranges
        .iter()
        .map(|r| r.start)
        .chain(std::iter::once(mnz))
        .collect();

    let mut ci = try_alloc(mnz, Entry::default())?;
    let mut cx = try_alloc(mnz, Z::default())?;
    let ci_pieces = crate::utils::split_by_offsets(&mut ci, &offsets);
    let cx_pieces = crate::utils::split_by_offsets(&mut cx, &offsets);

    let nzombies: usize = parallel::install(nthreads, || {
        ci_pieces
            .into_par_iter()
            .zip(cx_pieces)
            .zip(tasks.tasks.par_iter().zip(ranges.par_iter()))
            .map(|((ci, cx), (task, prange))| {
                let mut zombies = 0;
                let mut o = 0;
                for k in task.vectors() {
                    let kb = right.find_vector(mv.vector(k));
                    let vr = mv.range(k);
                    let lo = vr.start.max(prange.start);
                    let hi = vr.end.min(prange.end);
                    for pm in lo..hi {
                        let i = mv.index(pm);
                        let z = match (mask.is_set_at(pm), left.find_vector(i), kb) {
                            (true, Some(ka), Some(kb)) => dot(f, ka, kb),
                            _ => None,
                        };
                        match z {
                            Some(z) => {
                                ci[o] = Entry::present(i);
                                cx[o] = z;
                            }
                            None => {
                                ci[o] = Entry::zombie(i);
                                zombies += 1;
                            }
                        }
                        o += 1;
                    }
                }
                zombies
            })
            .sum()
    })?;

    let store = match h {
        None => Store::Sparse {
            p,
            i: ci.into(),
            x: cx.into(),
        },
        Some(h) => Store::Hypersparse {
            p,
            h,
            i: ci.into(),
            x: cx.into(),
        },
    };
    Ok(Product { store, nzombies })
}
