//! Error type shared by the reduction engine and the sweep harness.

use thiserror::Error;

use crate::strategies::Strategy;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a trial or a sweep.
///
/// Variants fall into three classes. Configuration errors (see
/// [`Error::is_configuration`]) abort a single trial and leave the others
/// untouched. [`Error::UnsupportedCombination`] is the correctness hazard of
/// applying an exclusive-update instruction to a combine the hardware cannot
/// perform. Output errors abort the whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// Worker count was zero or above [`MAX_WORKERS`](crate::executor::MAX_WORKERS).
    #[error("invalid worker count {count}: expected 1..={max}")]
    InvalidWorkerCount {
        /// The rejected count
        count: usize,
        /// Largest accepted count
        max: usize,
    },

    /// The two vectors of a pair differ in length.
    #[error("vector lengths do not match: {left} != {right}")]
    LengthMismatch {
        /// Length of the first vector
        left: usize,
        /// Length of the second vector
        right: usize,
    },

    /// A flat buffer could not be viewed as an `n x n` matrix.
    #[error("buffer of {len} values is not a {n}x{n} matrix")]
    NotSquare {
        /// Length of the buffer
        len: usize,
        /// Requested side length
        n: usize,
    },

    /// A scheduling policy was configured with a zero-sized chunk.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The sweep parameters describe no work, or an impossible range.
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    /// The strategy cannot perform the operator's combine step.
    #[error("{strategy} cannot combine with `{operator}`: only additive accumulation has a hardware update")]
    UnsupportedCombination {
        /// Strategy that was requested
        strategy: Strategy,
        /// Name of the combine operator
        operator: &'static str,
    },

    /// The persistence sink rejected a record.
    #[error("failed to write record: {0}")]
    Csv(#[from] csv::Error),

    /// The persistence sink could not be opened.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The built-in reduction's worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Returns `true` for errors that only invalidate the trial that raised them.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidWorkerCount { .. }
                | Error::LengthMismatch { .. }
                | Error::NotSquare { .. }
                | Error::InvalidSchedule(_)
                | Error::InvalidSweep(_)
                | Error::UnsupportedCombination { .. }
        )
    }
}
