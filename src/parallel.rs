//! # Parallel-for provider
//!
//! Every parallel region is a fork-join loop over independent tasks that
//! lives for one call. A call decides how many threads its work deserves
//! (see [`Context::nthreads_for`]) and runs its tasks on a rayon pool of
//! that size, one thread included, so nested parallel iterators never reach
//! the global pool.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config;
use crate::error::{GrbError, Result};

/// Thread budget of one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Context {
    /// Maximum number of threads the call may use
    pub nthreads_max: usize,
    /// Work per thread below which adding threads does not pay
    pub chunk: f64,
}

impl Context {
    pub fn new(nthreads_max: usize, chunk: f64) -> Self {
        Self {
            nthreads_max: nthreads_max.max(1),
            chunk,
        }
    }

    /// A context that uses a single thread
    pub fn sequential() -> Self {
        Self::new(1, f64::MAX)
    }

    /// Number of threads to use for `work` units of work
    pub fn nthreads_for(&self, work: f64) -> usize {
        nthreads_for(work, self.chunk, self.nthreads_max)
    }
}

/// Number of threads for `work` units, at least one and at most `nthreads_max`
pub fn nthreads_for(work: f64, chunk: f64, nthreads_max: usize) -> usize {
    let work = work.max(1.0);
    let chunk = if chunk > 0.0 { chunk } else { 1.0 };
    let n = (work / chunk).floor();
    let n = if n < 1.0 { 1 } else { n as usize };
    n.clamp(1, nthreads_max.max(1))
}

static POOLS: OnceLock<Mutex<HashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();

/// Rayon pool with exactly `nthreads` threads, built once per size
fn pool(nthreads: usize) -> Result<Arc<ThreadPool>> {
    let pools = POOLS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut pools = pools.lock();
    if let Some(pool) = pools.get(&nthreads) {
        return Ok(Arc::clone(pool));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nthreads)
        .thread_name(|i| format!("semiblas-{}", i))
        .build()
        .map_err(|e| GrbError::InvalidValue(format!("failed to build thread pool: {}", e)))?;
    let pool = Arc::new(pool);
    pools.insert(nthreads, Arc::clone(&pool));
    Ok(pool)
}

/// Run `f(tid)` for every task `tid` in `0..ntasks` and collect the results
/// in task order
///
/// # Arguments
///
/// * `ntasks` - Number of independent tasks
/// * `nthreads` - Threads to use
/// * `f` - Task body
pub fn run_tasks<R, F>(ntasks: usize, nthreads: usize, f: F) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    install(nthreads, || (0..ntasks).into_par_iter().map(f).collect())
}

/// Run `op` inside a pool of `nthreads` threads
///
/// Parallel iterators created inside `op` inherit the pool's width.
pub fn install<R, OP>(nthreads: usize, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    let pool = pool(nthreads.max(1))?;
    Ok(pool.install(op))
}

/// Run `op` with as many threads as `work` units deserve under the
/// process-wide thread budget
pub(crate) fn install_for<R, OP>(work: f64, op: OP) -> Result<R>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    install(config::context().nthreads_for(work), op)
}
