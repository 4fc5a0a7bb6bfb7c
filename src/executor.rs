//! Fork-join execution of a parallel region.
//!
//! An [`Executor`] owns everything a trial needs to run on a given number of
//! workers:
//! - a validated [`WorkerCount`],
//! - a rayon pool of that size for the built-in reduction,
//! - the optional inner level used for nested decomposition.
//!
//! Building an executor spawns the rayon workers, so this happens outside the
//! timed region and the same executor can serve many trials.

use std::fmt;
use std::num::NonZeroUsize;
use std::thread;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Upper bound on workers per parallel level.
pub const MAX_WORKERS: usize = 256;

/// Number of workers in a parallel region, within `1..=MAX_WORKERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerCount(NonZeroUsize);

impl WorkerCount {
    /// Validate a worker count.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_reductions::WorkerCount;
    ///
    /// assert_eq!(WorkerCount::new(16).unwrap().get(), 16);
    /// assert!(WorkerCount::new(0).is_err());
    /// ```
    pub fn new(count: usize) -> Result<Self> {
        match NonZeroUsize::new(count) {
            Some(count) if count.get() <= MAX_WORKERS => Ok(WorkerCount(count)),
            _ => Err(Error::InvalidWorkerCount {
                count,
                max: MAX_WORKERS,
            }),
        }
    }

    /// Returns the count.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Whether the per-row inner loop of a kernel gets its own parallel level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nesting {
    /// Only the outer loop is parallel.
    Disabled,
    /// Each outer worker splits its inner loops across `inner_workers`.
    Enabled {
        /// Workers in the inner level
        inner_workers: usize,
    },
}

impl Default for Nesting {
    fn default() -> Self {
        Nesting::Disabled
    }
}

/// The inner parallel level handed to kernels.
///
/// When nesting is off or unsupported this runs everything on the calling
/// worker.
pub struct InnerLevel {
    pool: Option<ThreadPool>,
}

impl InnerLevel {
    /// An inner level that never leaves the calling worker.
    pub fn sequential() -> Self {
        InnerLevel { pool: None }
    }

    /// Number of workers the inner level runs on.
    pub fn workers(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, |pool| pool.current_num_threads())
    }

    /// Minimum of a non-empty row.
    ///
    /// The scan is seeded with `row[0]`: a NaN there is the result, later
    /// NaNs are skipped.
    pub fn min(&self, row: &[f64]) -> f64 {
        let first = row[0];
        match &self.pool {
            Some(pool) if row.len() > 1 && !first.is_nan() => {
                let parts = pool.current_num_threads();
                let chunk = (row.len() + parts - 1) / parts;
                pool.install(|| {
                    row.par_chunks(chunk)
                        .map(|part| min_from(f64::INFINITY, part))
                        .reduce(|| first, f64::min)
                })
            }
            _ => min_from(first, &row[1..]),
        }
    }
}

// `f64::min` keeps the non-NaN side, so only a NaN seed survives.
fn min_from(seed: f64, values: &[f64]) -> f64 {
    if seed.is_nan() {
        return seed;
    }
    values.iter().copied().fold(seed, f64::min)
}

/// Runs parallel regions on a fixed number of workers.
pub struct Executor {
    workers: WorkerCount,
    pool: ThreadPool,
    inner: InnerLevel,
}

impl Executor {
    /// Executor with `workers` workers and no nesting.
    pub fn new(workers: usize) -> Result<Self> {
        ExecutorBuilder::new(workers).build()
    }

    /// Start configuring an executor.
    pub fn builder(workers: usize) -> ExecutorBuilder {
        ExecutorBuilder::new(workers)
    }

    /// Workers in the outer level.
    pub fn workers(&self) -> WorkerCount {
        self.workers
    }

    /// Workers that can be busy at once, counting both levels.
    pub fn active_workers(&self) -> usize {
        self.workers.get() * self.inner.workers()
    }

    /// Returns `true` if kernels get a parallel inner level.
    pub fn is_nested(&self) -> bool {
        self.inner.pool.is_some()
    }

    /// The inner level for kernels that decompose their rows.
    pub fn inner(&self) -> &InnerLevel {
        &self.inner
    }

    /// The rayon pool used by the built-in reduction.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Run `body(worker)` once for every worker id and wait for all of them.
    ///
    /// Workers `1..n` are fresh scoped threads and the calling thread acts as
    /// worker 0. Returning from this function is the region's closing barrier.
    /// A panic in any worker is propagated to the caller.
    pub fn fork_join<F>(&self, body: F)
    where
        F: Fn(usize) + Sync,
    {
        let workers = self.workers.get();
        if workers == 1 {
            body(0);
            return;
        }

        thread::scope(|s| {
            let body = &body;
            for worker in 1..workers {
                s.spawn(move || body(worker));
            }
            body(0);
        });
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Executor")
            .field("workers", &self.workers)
            .field("inner_workers", &self.inner.workers())
            .finish()
    }
}

/// Builder for [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
    workers: usize,
    nesting: Nesting,
    nested_supported: bool,
}

impl ExecutorBuilder {
    /// Builder for `workers` outer workers.
    pub fn new(workers: usize) -> Self {
        ExecutorBuilder {
            workers,
            nesting: Nesting::Disabled,
            nested_supported: true,
        }
    }

    /// Request nested decomposition.
    pub fn nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = nesting;
        self
    }

    /// Declare whether the runtime may open a parallel region inside another.
    ///
    /// Without support a requested inner level quietly runs on the calling
    /// worker instead of failing.
    pub fn nested_supported(mut self, supported: bool) -> Self {
        self.nested_supported = supported;
        self
    }

    /// Validate the worker counts and spawn the pools.
    pub fn build(self) -> Result<Executor> {
        let workers = WorkerCount::new(self.workers)?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|i| format!("reduce-worker-{}", i))
            .build()?;

        let inner = match self.nesting {
            Nesting::Enabled { inner_workers } if self.nested_supported => {
                let inner_workers = WorkerCount::new(inner_workers)?;
                let pool = ThreadPoolBuilder::new()
                    .num_threads(inner_workers.get())
                    .thread_name(|i| format!("reduce-inner-{}", i))
                    .build()?;
                InnerLevel { pool: Some(pool) }
            }
            Nesting::Enabled { inner_workers } => {
                log::warn!(
                    "nested parallelism unsupported, {} inner workers fall back to the calling worker",
                    inner_workers
                );
                InnerLevel::sequential()
            }
            Nesting::Disabled => InnerLevel::sequential(),
        };

        Ok(Executor {
            workers,
            pool,
            inner,
        })
    }
}
