#![warn(missing_docs)]

//! A reduction folds a large collection into a single value. When the fold is
//! split across threads, the partial results have to meet somewhere: a shared
//! accumulator that only one thread may write at a time. This crate measures
//! what that mutual exclusion costs as the number of threads and the size of
//! the problem grow.
//!
//! # Kernels
//!
//! Four aggregation kernels are provided, each as a sequential oracle in
//! [`kernels::sequential`] and as a parallel [`Reduction`](kernels::Reduction):
//!
//! - the maximum of the row minimums of a square matrix,
//! - the same over an upper-triangular matrix, reading only the cells on or
//!   above the diagonal,
//! - the minimum and maximum of a vector, skipping its first element,
//! - the dot product of two vectors of equal length.
//!
//! # Strategies
//!
//! Workers merge into the shared accumulator under one of four disciplines:
//!
//! ```text
//!  exclusive update   w0 ─CAS─┐     critical section   w0 ─[ merge ]─┐
//!                     w1 ─CAS─┼─ Σ                     w1 ─[ merge ]─┼─ acc
//!                     w2 ─CAS─┘                        w2 ─[ merge ]─┘
//!
//!  explicit lock      w0 ─acquire─merge─release─┐     built-in reduction
//!                     w1 ─acquire─merge─release─┼─ acc     w0 ─┐
//!                     w2 ─acquire─merge─release─┘          w1 ─┼─ tree ─ acc
//!                                                          w2 ─┘
//! ```
//!
//! An exclusive update is a single hardware instruction and exists only for
//! addition. Requesting it for `min` or `max` is rejected before any worker
//! starts, see [`Error::UnsupportedCombination`].
//!
//! Loop indices are handed to workers under a [`Schedule`]: one static block
//! per worker, fixed-size chunks claimed on demand, or guided chunks that
//! shrink as the loop drains.
//!
//! # Running trials and sweeps
//!
//! A [`Trial`] runs one kernel once and reports the value with the wall-clock
//! time of the parallel region:
//!
//! ```
//! use sync_reductions::{Input, Schedule, Strategy, Trial, Value};
//!
//! let input = Input::dot(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]).unwrap();
//! let trial = Trial::new(2, Strategy::ExclusiveUpdate).with_schedule(Schedule::DYNAMIC);
//!
//! let outcome = trial.run(&input).unwrap();
//! assert_eq!(outcome.value, Value::Scalar(32.0));
//! ```
//!
//! A [`Sweep`] repeats a trial over a grid of thread counts and problem sizes
//! and appends one [`Record`] per point to a CSV file. [`report::summarize`]
//! turns the records into speedups relative to a base thread count.

pub mod config;
pub mod data;
pub mod error;
pub mod executor;
pub mod generate;
pub mod kernels;
pub mod report;
pub mod schedule;
pub mod strategies;
pub mod sweep;
pub mod trial;

mod sync;

pub use crate::data::{Matrix, MinMax, ReductionOutcome, Shape, VectorPair};
pub use crate::error::{Error, Result};
pub use crate::executor::{Executor, Nesting, WorkerCount};
pub use crate::schedule::Schedule;
pub use crate::strategies::{Granularity, Plan, Strategy};
pub use crate::sweep::{CsvSink, Record, RecordSink, Sweep, Workload};
pub use crate::trial::{Input, Trial, Value};
