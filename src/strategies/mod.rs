//! Synchronization disciplines for merging into a shared accumulator.
//!
//! A [`Strategy`] is chosen once per trial and decides how workers combine
//! their results:
//!
//! | strategy | shared state | merges |
//! |---|---|---|
//! | [`ExclusiveUpdate`](Strategy::ExclusiveUpdate) | [`AtomicSum`] | compare-and-swap per element |
//! | [`CriticalSection`](Strategy::CriticalSection) | [`CriticalSection`] | one per worker |
//! | [`ExplicitLock`](Strategy::ExplicitLock) | [`ExplicitLock`] | one per worker |
//! | [`BuiltinReduction`](Strategy::BuiltinReduction) | none, rayon combines | n/a |
//!
//! The merge [`Granularity`] can be overridden for the first three. Merging
//! per element serializes every worker on the accumulator, which costs O(n)
//! synchronizations instead of O(workers).
//!
//! Exclusive update only exists for additive operators. Asking for it with
//! `min`/`max` fails with [`Error::UnsupportedCombination`] before any worker
//! starts.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::time::Instant;

use rayon::prelude::*;

use crate::data::ReductionOutcome;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::kernels::{Reduction, ValueOf};
use crate::schedule::{static_block, Schedule};

mod accumulators;
mod combine;

pub use self::accumulators::{
    AtomicSum, CriticalSection, ExplicitLock, LockGuard, NoExclusiveUpdate, SharedAccumulator,
};
pub use self::combine::{Combine, Max, MinAndMax, Sum};

/// How workers combine their contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Lock-free hardware update of the shared accumulator.
    ExclusiveUpdate,
    /// Merge inside a mutually exclusive region.
    CriticalSection,
    /// Merge under a lock that is acquired and released explicitly.
    ExplicitLock,
    /// The runtime's own parallel reduction.
    BuiltinReduction,
}

impl Strategy {
    /// All strategies, in the order they are usually reported.
    pub const ALL: [Strategy; 4] = [
        Strategy::ExclusiveUpdate,
        Strategy::CriticalSection,
        Strategy::ExplicitLock,
        Strategy::BuiltinReduction,
    ];

    /// Returns the strategy's name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Strategy::ExclusiveUpdate => "exclusive-update",
            Strategy::CriticalSection => "critical-section",
            Strategy::ExplicitLock => "explicit-lock",
            Strategy::BuiltinReduction => "builtin-reduction",
        }
    }

    /// Merge granularity used when none is configured.
    pub fn default_granularity(self) -> Granularity {
        match self {
            Strategy::ExclusiveUpdate => Granularity::PerElement,
            _ => Granularity::PerWorker,
        }
    }

    /// Check that this strategy can combine with `C` at all.
    pub fn check<C: Combine>(self, op: C) -> Result<()> {
        if self == Strategy::ExclusiveUpdate && op.exclusive().is_none() {
            log::error!(
                "{} requested for `{}`, which has no hardware update: rejecting",
                self,
                C::NAME
            );
            return Err(Error::UnsupportedCombination {
                strategy: self,
                operator: C::NAME,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive-update" | "atomic" => Ok(Strategy::ExclusiveUpdate),
            "critical-section" | "critical" => Ok(Strategy::CriticalSection),
            "explicit-lock" | "lock" => Ok(Strategy::ExplicitLock),
            "builtin-reduction" | "reduction" => Ok(Strategy::BuiltinReduction),
            other => Err(format!(
                "unknown strategy '{}': expected one of {}",
                other,
                Strategy::ALL
                    .iter()
                    .map(|s| s.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// How often a worker touches the shared accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Every contribution is merged as soon as it is computed.
    PerElement,
    /// Each worker folds its chunks locally and merges once at the end.
    PerWorker,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Granularity::PerElement => "per-element",
            Granularity::PerWorker => "per-worker",
        })
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-element" | "element" => Ok(Granularity::PerElement),
            "per-worker" | "worker" => Ok(Granularity::PerWorker),
            other => Err(format!(
                "unknown granularity '{}': expected per-element or per-worker",
                other
            )),
        }
    }
}

/// Strategy, schedule and granularity of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Plan {
    /// Merge discipline
    pub strategy: Strategy,
    /// Partitioning of the outer loop
    pub schedule: Schedule,
    /// Override of [`Strategy::default_granularity`]
    pub granularity: Option<Granularity>,
}

impl Plan {
    /// Plan with static scheduling and the strategy's default granularity.
    pub fn new(strategy: Strategy) -> Self {
        Plan {
            strategy,
            schedule: Schedule::Static,
            granularity: None,
        }
    }

    /// Replace the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Override the merge granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// The granularity in effect.
    pub fn granularity(&self) -> Granularity {
        self.granularity
            .unwrap_or_else(|| self.strategy.default_granularity())
    }
}

/// Run `reduction` on `executor` as described by `plan`, timing the parallel
/// region.
///
/// Configuration problems are reported before the clock starts.
///
/// # Examples
///
/// ```
/// use sync_reductions::kernels::DotProduct;
/// use sync_reductions::strategies::{reduce, Plan, Strategy};
/// use sync_reductions::{Executor, VectorPair};
///
/// let pair = VectorPair::new(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]).unwrap();
/// let executor = Executor::new(2).unwrap();
///
/// let outcome = reduce(&DotProduct::new(&pair), &executor, &Plan::new(Strategy::ExplicitLock)).unwrap();
///
/// assert_eq!(outcome.value, 32.0);
/// ```
pub fn reduce<R: Reduction>(
    reduction: &R,
    executor: &Executor,
    plan: &Plan,
) -> Result<ReductionOutcome<ValueOf<R>>> {
    plan.schedule.validate()?;
    let op = reduction.op();
    plan.strategy.check(op)?;

    log::debug!(
        "{} via {} ({}, {}) on {} workers",
        R::NAME,
        plan.strategy,
        plan.schedule,
        plan.granularity(),
        executor.active_workers()
    );

    let outcome = match plan.strategy {
        Strategy::ExclusiveUpdate => match op.exclusive() {
            Some(accumulator) => timed(|| merge_all(reduction, executor, plan, accumulator)),
            None => {
                return Err(Error::UnsupportedCombination {
                    strategy: plan.strategy,
                    operator: <R::Op as Combine>::NAME,
                })
            }
        },
        Strategy::CriticalSection => {
            let accumulator = CriticalSection::new(op);
            timed(|| merge_all(reduction, executor, plan, accumulator))
        }
        Strategy::ExplicitLock => {
            let accumulator = ExplicitLock::new(op);
            timed(|| merge_all(reduction, executor, plan, accumulator))
        }
        Strategy::BuiltinReduction => timed(|| builtin(reduction, executor, plan.schedule)),
    };

    Ok(outcome)
}

fn timed<V>(f: impl FnOnce() -> V) -> ReductionOutcome<V> {
    let start = Instant::now();
    let value = f();
    ReductionOutcome {
        value,
        elapsed: start.elapsed(),
    }
}

// Fork the workers, let each claim chunks under the plan's schedule and merge
// into `accumulator` at the plan's granularity, then join.
fn merge_all<R, A>(reduction: &R, executor: &Executor, plan: &Plan, accumulator: A) -> ValueOf<R>
where
    R: Reduction,
    A: SharedAccumulator<ValueOf<R>>,
{
    let op = reduction.op();
    let inner = executor.inner();
    let partition = plan
        .schedule
        .partition(reduction.indices(), executor.workers().get());
    let granularity = plan.granularity();

    executor.fork_join(|worker| match granularity {
        Granularity::PerElement => partition.for_each_chunk(worker, |chunk| {
            for index in chunk {
                accumulator.merge(reduction.item(index, inner));
            }
        }),
        Granularity::PerWorker => {
            let mut local = op.identity();
            partition.for_each_chunk(worker, |chunk| {
                for index in chunk {
                    local = op.combine(local, reduction.item(index, inner));
                }
            });
            accumulator.merge(local);
        }
    });

    accumulator.into_inner()
}

fn builtin<R: Reduction>(reduction: &R, executor: &Executor, schedule: Schedule) -> ValueOf<R> {
    let op = reduction.op();
    let inner = executor.inner();
    let indices = reduction.indices();
    let fold_range = |range: Range<usize>| {
        range.fold(op.identity(), |acc, index| {
            op.combine(acc, reduction.item(index, inner))
        })
    };

    executor.pool().install(|| match schedule {
        Schedule::Static => {
            let workers = executor.workers().get();
            let len = indices.len();
            (0..workers)
                .into_par_iter()
                .map(|worker| {
                    let block = static_block(len, workers, worker);
                    fold_range(indices.start + block.start..indices.start + block.end)
                })
                .reduce(|| op.identity(), |a, b| op.combine(a, b))
        }
        Schedule::Dynamic { chunk } => indices
            .into_par_iter()
            .with_min_len(chunk.max(1))
            .fold(
                || op.identity(),
                |acc, index| op.combine(acc, reduction.item(index, inner)),
            )
            .reduce(|| op.identity(), |a, b| op.combine(a, b)),
        Schedule::Guided { .. } => indices
            .into_par_iter()
            .fold(
                || op.identity(),
                |acc, index| op.combine(acc, reduction.item(index, inner)),
            )
            .reduce(|| op.identity(), |a, b| op.combine(a, b)),
    })
}
