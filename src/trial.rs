//! One timed run of one kernel under one configuration.
//!
//! The kernel is picked by the shape of the [`Input`]: a matrix runs
//! max-of-row-mins, a single vector runs extremes and a pair runs the dot
//! product.

use std::fmt;

use crate::data::{Matrix, MinMax, ReductionOutcome, Shape, VectorPair};
use crate::error::Result;
use crate::executor::{Executor, Nesting};
use crate::kernels::{sequential, DotProduct, Extremes, MaxOfRowMins};
use crate::schedule::Schedule;
use crate::strategies::{reduce, Granularity, Plan, Strategy};

/// Data a trial reduces over.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Reduced with max-of-row-mins
    Matrix(Matrix),
    /// Reduced to its extremes, skipping index 0
    Vector(Vec<f64>),
    /// Reduced to its dot product
    Pair(VectorPair),
}

impl Input {
    /// Pair two vectors for a dot product, rejecting a length mismatch.
    pub fn dot(left: Vec<f64>, right: Vec<f64>) -> Result<Self> {
        Ok(Input::Pair(VectorPair::new(left, right)?))
    }

    /// Problem size: matrix side length or vector length.
    pub fn size(&self) -> usize {
        match self {
            Input::Matrix(matrix) => matrix.n(),
            Input::Vector(values) => values.len(),
            Input::Pair(pair) => pair.len(),
        }
    }

    /// Name of the kernel this input selects.
    pub fn kernel_name(&self) -> &'static str {
        match self {
            Input::Matrix(matrix) => match matrix.shape() {
                Shape::Full => "max-of-row-mins",
                Shape::UpperTriangular => "max-of-row-mins (triangular)",
            },
            Input::Vector(_) => "extremes",
            Input::Pair(_) => "dot-product",
        }
    }

    /// The single-threaded reference result.
    pub fn sequential(&self) -> Value {
        match self {
            Input::Matrix(matrix) => Value::Scalar(sequential::max_of_row_mins(matrix)),
            Input::Vector(values) => Value::Extremes(sequential::extremes(values)),
            Input::Pair(pair) => Value::Scalar(
                sequential::dot_product(pair.left(), pair.right())
                    .expect("pair lengths checked on construction"),
            ),
        }
    }
}

/// Result of a trial, whatever the kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Max-of-row-mins or dot product
    Scalar(f64),
    /// Extremes
    Extremes(MinMax),
}

impl Value {
    /// The scalar, if this is one.
    pub fn as_scalar(&self) -> Option<f64> {
        match *self {
            Value::Scalar(value) => Some(value),
            Value::Extremes(_) => None,
        }
    }

    /// The extremes, if this is a pair.
    pub fn as_extremes(&self) -> Option<MinMax> {
        match *self {
            Value::Extremes(extremes) => Some(extremes),
            Value::Scalar(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Scalar(value) => write!(f, "{}", value),
            Value::Extremes(MinMax { min, max }) => write!(f, "min {} max {}", min, max),
        }
    }
}

/// Worker count, plan and nesting of a trial.
///
/// # Examples
///
/// ```
/// use sync_reductions::{Input, Strategy, Trial, Value};
///
/// let input = Input::Vector(vec![5.0, 1.0, 9.0, 3.0]);
/// let outcome = Trial::new(4, Strategy::CriticalSection).run(&input).unwrap();
///
/// assert_eq!(outcome.value, input.sequential());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Outer workers
    pub workers: usize,
    /// Strategy, schedule and granularity
    pub plan: Plan,
    /// Inner level for row scans
    pub nesting: Nesting,
    /// Whether the runtime may nest parallel regions
    pub nested_supported: bool,
}

impl Trial {
    /// Trial with static scheduling and no nesting.
    pub fn new(workers: usize, strategy: Strategy) -> Self {
        Trial {
            workers,
            plan: Plan::new(strategy),
            nesting: Nesting::Disabled,
            nested_supported: true,
        }
    }

    /// Replace the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Replace the schedule.
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.plan = self.plan.with_schedule(schedule);
        self
    }

    /// Override the merge granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.plan = self.plan.with_granularity(granularity);
        self
    }

    /// Request nested decomposition.
    pub fn with_nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = nesting;
        self
    }

    /// Declare whether nested regions are supported.
    pub fn with_nested_supported(mut self, supported: bool) -> Self {
        self.nested_supported = supported;
        self
    }

    /// Build an executor for this trial's worker counts.
    pub fn executor(&self) -> Result<Executor> {
        Executor::builder(self.workers)
            .nesting(self.nesting)
            .nested_supported(self.nested_supported)
            .build()
    }

    /// Build an executor and run once on `input`.
    pub fn run(&self, input: &Input) -> Result<ReductionOutcome<Value>> {
        let executor = self.executor()?;
        self.run_on(&executor, input)
    }

    /// Run once on `input` with an executor built earlier.
    ///
    /// The executor's worker counts take precedence over `self.workers`.
    pub fn run_on(&self, executor: &Executor, input: &Input) -> Result<ReductionOutcome<Value>> {
        let plan = &self.plan;
        let outcome = match input {
            Input::Matrix(matrix) => {
                reduce(&MaxOfRowMins::new(matrix), executor, plan)?.map(Value::Scalar)
            }
            Input::Vector(values) => {
                reduce(&Extremes::new(values), executor, plan)?.map(Value::Extremes)
            }
            Input::Pair(pair) => reduce(&DotProduct::new(pair), executor, plan)?.map(Value::Scalar),
        };

        log::debug!(
            "{} n={} W={} {}: {} in {}us",
            input.kernel_name(),
            input.size(),
            executor.active_workers(),
            plan.strategy,
            outcome.value,
            outcome.elapsed_micros()
        );
        Ok(outcome)
    }
}
