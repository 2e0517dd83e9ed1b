//! # Work partitioner
//!
//! Splits the vectors of an operation into tasks of comparable cost. A
//! *coarse* task owns a run of whole vectors; a *fine* task owns part of a
//! single vector that is too expensive for one task. Slicing is done once
//! per call, before any parallel work starts.

use std::ops::Range;

use crate::constants::NTASKS_PER_THREAD;

pub use crate::parallel::nthreads_for;

/// Boundaries splitting vectors `0..nvec` into `ntasks` slices of similar
/// cumulative count
///
/// `p` holds cumulative counts (`nvec + 1` offsets, as the vector pointers
/// of a sparse matrix). The result has `ntasks + 1` non-decreasing entries
/// from 0 to `nvec`; slice `t` is `slice[t]..slice[t+1]`.
pub fn pslice(p: &[usize], ntasks: usize) -> Vec<usize> {
    let nvec = p.len().saturating_sub(1);
    let ntasks = ntasks.max(1);
    let mut slice = Vec::with_capacity(ntasks + 1);
    slice.push(0);
    if nvec == 0 {
        slice.resize(ntasks + 1, 0);
        return slice;
    }

    let base = p[0];
    let total = p[nvec] - base;
    for t in 1..ntasks {
        let k = if total == 0 {
            t * nvec / ntasks
        } else {
            // first vector whose start reaches the t-th share of the work
            let target = base + (t as u128 * total as u128 / ntasks as u128) as usize;
            p[..nvec].partition_point(|&pk| pk < target)
        };
        let prev = slice[t - 1];
        slice.push(k.clamp(prev, nvec));
    }
    slice.push(nvec);
    slice
}

/// `0..n` split into at most `ntasks` contiguous, non-empty ranges of
/// near-equal length (one empty range when `n` is 0)
pub fn split_range(n: usize, ntasks: usize) -> Vec<Range<usize>> {
    let ntasks = ntasks.clamp(1, n.max(1));
    (0..ntasks)
        .map(|t| t * n / ntasks..(t + 1) * n / ntasks)
        .collect()
}

/// One unit of parallel work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// First vector of the task
    pub kfirst: usize,
    /// One past the last vector of the task
    pub klast: usize,
    /// For a fine task, the part of vector `kfirst` it owns
    pub range: Option<Range<usize>>,
}

impl Task {
    pub fn coarse(kfirst: usize, klast: usize) -> Self {
        Self {
            kfirst,
            klast,
            range: None,
        }
    }

    pub fn fine(k: usize, range: Range<usize>) -> Self {
        Self {
            kfirst: k,
            klast: k + 1,
            range: Some(range),
        }
    }

    pub fn is_fine(&self) -> bool {
        self.range.is_some()
    }

    /// Vectors covered by the task
    pub fn vectors(&self) -> Range<usize> {
        self.kfirst..self.klast
    }
}

/// Tasks of one call, in vector order, and the threads to run them on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub nthreads: usize,
}

impl TaskList {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn nfine(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_fine()).count()
    }
}

/// Task budget for a thread count
pub fn ntasks_max(nthreads: usize) -> usize {
    if nthreads <= 1 {
        1
    } else {
        NTASKS_PER_THREAD * nthreads
    }
}

/// Core slicing heuristic
///
/// With `ntasks_max` tasks allowed, the target task cost is
/// `total / (ntasks_max - 1)`. Cheap vectors are grouped into coarse tasks
/// reaching the target; a vector costing at least twice the target closes
/// the open coarse task and is split into `cost / target - 1` fine tasks
/// over its `units(k)` units. Never yields more than `ntasks_max` tasks.
fn slice_vectors(costs: &[usize], units: impl Fn(usize) -> usize, ntasks_max: usize) -> Vec<Task> {
    let nvec = costs.len();
    if nvec == 0 {
        return Vec::new();
    }
    if ntasks_max <= 1 {
        return vec![Task::coarse(0, nvec)];
    }

    let total: usize = costs.iter().sum();
    if total == 0 {
        let ntasks = ntasks_max.min(nvec);
        return split_range(nvec, ntasks)
            .into_iter()
            .map(|r| Task::coarse(r.start, r.end))
            .collect();
    }

    let target = total.div_ceil(ntasks_max - 1).max(1);
    let mut tasks = Vec::new();
    let mut start = 0;
    let mut acc = 0;

    for (k, &cost) in costs.iter().enumerate() {
        if cost >= 2 * target {
            if start < k {
                tasks.push(Task::coarse(start, k));
            }
            let n = units(k);
            let nfine = (cost / target - 1).min(n);
            if nfine >= 2 {
                tasks.extend(split_range(n, nfine).into_iter().map(|r| Task::fine(k, r)));
            } else {
                tasks.push(Task::coarse(k, k + 1));
            }
            start = k + 1;
            acc = 0;
        } else {
            acc += cost;
            if acc >= target {
                tasks.push(Task::coarse(start, k + 1));
                start = k + 1;
                acc = 0;
            }
        }
    }
    if start < nvec {
        tasks.push(Task::coarse(start, nvec));
    }
    tasks
}

/// Tasks for an element-wise operation
///
/// `costs[k]` is the work of output vector `k`; a fine task owns an index
/// range of `0..vlen` within its vector.
pub fn ewise_slice(costs: &[usize], vlen: usize, nthreads: usize) -> TaskList {
    TaskList {
        tasks: slice_vectors(costs, |_| vlen, ntasks_max(nthreads)),
        nthreads,
    }
}

/// Tasks for a saxpy multiply
///
/// `costs[k]` is the flop count of output vector `k` and `bnnz[k]` the
/// number of entries of the `B` vector producing it; a fine task owns a
/// range of those entries.
pub fn saxpy_slice(costs: &[usize], bnnz: &[usize], nthreads: usize) -> TaskList {
    TaskList {
        tasks: slice_vectors(costs, |k| bnnz[k], ntasks_max(nthreads)),
        nthreads,
    }
}

/// Number of slices of `A` and of `B` for a dot-product multiply
///
/// With a single vector of `B` all the parallelism comes from `A`; with
/// many vectors of `B` only `B` is sliced. Otherwise each vector of `B` is
/// a slice and `A` is cut enough to keep every thread busy.
pub fn dot_slice_counts(anvec: usize, bnvec: usize, nthreads: usize) -> (usize, usize) {
    if nthreads <= 1 {
        return (1, 1);
    }
    let ntasks = NTASKS_PER_THREAD * nthreads;
    if bnvec == 1 {
        (ntasks, 1)
    } else if anvec == 1 || bnvec == 0 || bnvec > ntasks {
        (1, ntasks)
    } else {
        let naslice = (ntasks / bnvec).min(anvec / 4).max(nthreads);
        (naslice, bnvec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(tasks: &[Task], costs: &[usize], units: impl Fn(usize) -> usize) {
        let mut next = 0;
        let mut fine_next = 0;
        for task in tasks {
            match &task.range {
                None => {
                    assert_eq!(fine_next, 0, "fine tasks of a vector left incomplete");
                    assert_eq!(task.kfirst, next);
                    assert!(task.klast > task.kfirst);
                    next = task.klast;
                }
                Some(r) => {
                    assert_eq!(task.kfirst, next);
                    assert_eq!(r.start, fine_next);
                    fine_next = r.end;
                    if fine_next == units(task.kfirst) {
                        fine_next = 0;
                        next += 1;
                    }
                }
            }
        }
        assert_eq!(next, costs.len());
    }

    #[test]
    fn test_pslice_balances_counts() {
        let p = [0, 10, 10, 20, 30, 40];
        assert_eq!(pslice(&p, 2), vec![0, 3, 5]);
        assert_eq!(pslice(&p, 1), vec![0, 5]);
        assert_eq!(pslice(&[0], 3), vec![0, 0, 0, 0]);
        assert_eq!(pslice(&[0, 0, 0, 0, 0], 2), vec![0, 2, 4]);
    }

    #[test]
    fn test_split_range() {
        assert_eq!(split_range(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(split_range(2, 5), vec![0..1, 1..2]);
        assert_eq!(split_range(0, 4), vec![0..0]);
    }

    #[test]
    fn test_single_thread_is_one_task() {
        let costs = [5, 100, 3];
        let list = ewise_slice(&costs, 1000, 1);
        assert_eq!(list.tasks, vec![Task::coarse(0, 3)]);
        assert!(ewise_slice(&[], 10, 4).is_empty());
    }

    #[test]
    fn test_heavy_vector_gets_fine_tasks() {
        let mut costs = vec![1; 100];
        costs[40] = 10_000;
        let list = ewise_slice(&costs, 5000, 2);
        assert!(list.len() <= ntasks_max(2));
        assert!(list.nfine() >= 2);
        assert!(list.iter().filter(|t| t.is_fine()).all(|t| t.kfirst == 40));
        assert_covers(&list.tasks, &costs, |_| 5000);
    }

    #[test]
    fn test_fine_tasks_limited_by_units() {
        let costs = [1, 1_000_000, 1];
        let bnnz = [1, 3, 1];
        let list = saxpy_slice(&costs, &bnnz, 4);
        assert_eq!(list.nfine(), 3);
        assert_covers(&list.tasks, &costs, |k| bnnz[k]);
    }

    #[test]
    fn test_dot_slice_counts() {
        assert_eq!(dot_slice_counts(100, 100, 1), (1, 1));
        assert_eq!(dot_slice_counts(100, 1, 4), (128, 1));
        assert_eq!(dot_slice_counts(1, 50, 4), (1, 128));
        assert_eq!(dot_slice_counts(100, 1000, 4), (1, 128));
        assert_eq!(dot_slice_counts(100, 10, 4), (12, 10));
        assert_eq!(dot_slice_counts(8, 10, 4), (4, 10));
    }
}
