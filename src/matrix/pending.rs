//! Deferred work: pending tuples and zombies
//!
//! Scattered single-entry writes are queued and merged in one sorted pass,
//! and deletions leave zombies that are compacted in the same pass.
//! [`Matrix::wait`] finishes all of it; until then every reader goes through
//! a flushed copy.

use rayon::prelude::*;

use super::build::{build_parts, DupPolicy, Parts};
use super::buffer::try_with_capacity;
use super::{Entry, Matrix, Sparsity, View};
use crate::config::burble;
use crate::error::{GrbError, Result};
use crate::ops::BinaryOp;
use crate::parallel;
use crate::types::Scalar;

/// Queued insertions, in vector coordinates
#[derive(Debug, Clone)]
pub(crate) struct Pending<T> {
    i: Vec<usize>,
    j: Vec<usize>,
    x: Vec<T>,
    /// Combines a tuple with an earlier one or an existing entry;
    /// `None` means the later value wins
    pub op: Option<BinaryOp<T, T, T>>,
    /// True while the tuples are in `(j, i)` order
    sorted: bool,
}

impl<T: Scalar> Pending<T> {
    pub fn new(op: Option<BinaryOp<T, T, T>>) -> Self {
        Self {
            i: Vec::new(),
            j: Vec::new(),
            x: Vec::new(),
            op,
            sorted: true,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn push(&mut self, i: usize, j: usize, x: T) -> Result<()> {
        let oom = |_| GrbError::OutOfMemory {
            bytes: 2 * std::mem::size_of::<usize>() + std::mem::size_of::<T>(),
        };
        self.i.try_reserve(1).map_err(oom)?;
        self.j.try_reserve(1).map_err(oom)?;
        self.x.try_reserve(1).map_err(oom)?;
        if let (Some(&li), Some(&lj)) = (self.i.last(), self.j.last()) {
            if (j, i) < (lj, li) {
                self.sorted = false;
            }
        }
        self.i.push(i);
        self.j.push(j);
        self.x.push(x);
        Ok(())
    }

    pub fn tuples(&self) -> (&[usize], &[usize], &[T]) {
        (&self.i, &self.j, &self.x)
    }

    fn assemble(&self) -> Result<Parts<T>> {
        let dup = match self.op {
            Some(op) => DupPolicy::Op(op),
            None => DupPolicy::Last,
        };
        build_parts(&self.i, &self.j, &self.x, &dup, self.sorted)
    }
}

/// Union of two sorted structures; where both hold an index the entry of `b`
/// wins, or the two are combined with `op`
fn merge_parts<T: Scalar>(a: &Parts<T>, b: &Parts<T>, op: Option<BinaryOp<T, T, T>>) -> Result<Parts<T>> {
    let (na, nb) = (a.nvec(), b.nvec());
    let cap = a.i.len() + b.i.len();
    let mut out = Parts {
        p: try_with_capacity(na + nb + 1)?,
        h: Some(try_with_capacity(na + nb)?),
        i: try_with_capacity(cap)?,
        x: try_with_capacity(cap)?,
    };
    out.p.push(0);

    let (mut ka, mut kb) = (0, 0);
    while ka < na || kb < nb {
        let ja = if ka < na { a.vector(ka) } else { usize::MAX };
        let jb = if kb < nb { b.vector(kb) } else { usize::MAX };
        let j = ja.min(jb);
        let (mut pa, pa_end) = if ja == j { (a.p[ka], a.p[ka + 1]) } else { (0, 0) };
        let (mut pb, pb_end) = if jb == j { (b.p[kb], b.p[kb + 1]) } else { (0, 0) };

        while pa < pa_end || pb < pb_end {
            let ia = if pa < pa_end { a.i[pa].index() } else { usize::MAX };
            let ib = if pb < pb_end { b.i[pb].index() } else { usize::MAX };
            if ia < ib {
                out.i.push(Entry::present(ia));
                out.x.push(a.x[pa]);
                pa += 1;
            } else if ib < ia {
                out.i.push(Entry::present(ib));
                out.x.push(b.x[pb]);
                pb += 1;
            } else {
                let x = match op {
                    Some(op) => op.apply(a.x[pa], b.x[pb]),
                    None => b.x[pb],
                };
                out.i.push(Entry::present(ia));
                out.x.push(x);
                pa += 1;
                pb += 1;
            }
        }

        if let Some(h) = out.h.as_mut() {
            h.push(j);
        }
        out.p.push(out.i.len());
        if ja == j {
            ka += 1;
        }
        if jb == j {
            kb += 1;
        }
    }
    Ok(out)
}

impl<T: Scalar> Matrix<T> {
    /// Live slots of every vector, sorted, with zombies removed
    fn compact_parts(&self) -> Result<Parts<T>> {
        if self.sparsity().is_dense_like() {
            return self.to_parts();
        }
        let v = View::new(self);
        let hyper = self.sparsity() == Sparsity::Hypersparse;
        let jumbled = self.jumbled;

        let vectors: Vec<(usize, Vec<(Entry, T)>)> = parallel::install_for(self.nnz_held() as f64, || {
            (0..v.nvec())
                .into_par_iter()
                .map(|k| {
                    let mut slots: Vec<(Entry, T)> = v.slots(k).filter(|(e, _)| e.is_present()).collect();
                    if jumbled {
                        slots.sort_unstable_by_key(|(e, _)| e.index());
                    }
                    (v.vector(k), slots)
                })
                .collect()
        })?;

        let live = self.nvals_held();
        let mut parts = Parts {
            p: try_with_capacity(vectors.len() + 1)?,
            h: if hyper { Some(try_with_capacity(vectors.len())?) } else { None },
            i: try_with_capacity(live)?,
            x: try_with_capacity(live)?,
        };
        parts.p.push(0);
        for (j, slots) in vectors {
            if let Some(h) = parts.h.as_mut() {
                // empty vectors leave the hyperlist
                if slots.is_empty() {
                    continue;
                }
                h.push(j);
            }
            for (e, x) in slots {
                parts.i.push(e);
                parts.x.push(x);
            }
            parts.p.push(parts.i.len());
        }
        Ok(parts)
    }

    /// Finishes all deferred work
    ///
    /// Zombies are removed, jumbled vectors sorted and pending tuples merged
    /// in, after which the layout is re-chosen. On error the matrix is left
    /// exactly as it was. Calling `wait` on a matrix without deferred work
    /// changes nothing.
    pub fn wait(&mut self) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        burble!(
            "wait: {} pending, {} zombies{}",
            self.npending(),
            self.nzombies,
            if self.jumbled { ", jumbled" } else { "" }
        );

        let hyper = self.sparsity() == Sparsity::Hypersparse;
        let mut parts = self.compact_parts()?;
        if let Some(pending) = &self.pending {
            let tuples = pending.assemble()?;
            parts = merge_parts(&parts, &tuples, pending.op)?;
        }
        let nonempty = parts.nonempty();
        let store = parts.into_store(hyper, self.vdim)?;

        self.store = store;
        self.pending = None;
        self.nzombies = 0;
        self.jumbled = false;
        self.nvec_nonempty = Some(nonempty);
        self.conform()
    }
}
