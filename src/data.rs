//! Inputs and results of a reduction.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Which cells of a [`Matrix`] hold data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Every cell is populated.
    Full,
    /// Only cells on or above the diagonal are populated. Cells below it are
    /// never read, whatever they contain.
    UpperTriangular,
}

/// Square, row-major matrix of doubles.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    n: usize,
    shape: Shape,
    cells: Box<[f64]>,
}

impl Matrix {
    /// View `cells` as an `n x n` row-major matrix.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_reductions::{Matrix, Shape};
    ///
    /// let matrix = Matrix::from_flat(2, Shape::Full, vec![4.0, 2.0, 7.0, 1.0]).unwrap();
    ///
    /// assert_eq!(matrix.row(1), &[7.0, 1.0]);
    /// assert!(Matrix::from_flat(2, Shape::Full, vec![1.0]).is_err());
    /// ```
    pub fn from_flat(n: usize, shape: Shape, cells: Vec<f64>) -> Result<Self> {
        if n.checked_mul(n) != Some(cells.len()) {
            return Err(Error::NotSquare {
                len: cells.len(),
                n,
            });
        }

        Ok(Matrix {
            n,
            shape,
            cells: cells.into_boxed_slice(),
        })
    }

    /// Build a matrix from nested rows, each of which must have `rows.len()`
    /// entries.
    pub fn from_rows(shape: Shape, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut cells = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(Error::NotSquare {
                    len: cells.len() + row.len(),
                    n,
                });
            }
            cells.extend(row);
        }

        Matrix::from_flat(n, shape, cells)
    }

    /// Side length.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Returns the shape.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// First column of row `i` that holds data.
    #[inline]
    pub fn first_col(&self, i: usize) -> usize {
        match self.shape {
            Shape::Full => 0,
            Shape::UpperTriangular => i,
        }
    }

    /// The populated part of row `i`.
    ///
    /// For an upper-triangular matrix this starts at the diagonal, so the
    /// returned slice is never empty while `i < n`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.n;
        &self.cells[start + self.first_col(i)..start + self.n]
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("n", &self.n)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Two vectors of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPair {
    left: Vec<f64>,
    right: Vec<f64>,
}

impl VectorPair {
    /// Pair up two vectors, rejecting a length mismatch instead of truncating.
    ///
    /// # Examples
    ///
    /// ```
    /// use sync_reductions::VectorPair;
    ///
    /// assert!(VectorPair::new(vec![1.0, 2.0], vec![3.0, 4.0]).is_ok());
    /// assert!(VectorPair::new(vec![1.0, 2.0], vec![3.0]).is_err());
    /// ```
    pub fn new(left: Vec<f64>, right: Vec<f64>) -> Result<Self> {
        if left.len() != right.len() {
            return Err(Error::LengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }

        Ok(VectorPair { left, right })
    }

    /// Common length of both vectors.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns `true` when both vectors are empty.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Returns the first vector.
    pub fn left(&self) -> &[f64] {
        &self.left
    }

    /// Returns the second vector.
    pub fn right(&self) -> &[f64] {
        &self.right
    }
}

/// Running `(min, max)` pair.
///
/// Starts at `(+inf, -inf)` so that an input without any element leaves the
/// sentinels in place and [`MinMax::is_empty`] reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    /// Smallest value seen
    pub min: f64,
    /// Largest value seen
    pub max: f64,
}

impl MinMax {
    /// The pair before any update.
    pub const EMPTY: MinMax = MinMax {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    /// The pair after observing a single value.
    #[inline]
    pub fn of(value: f64) -> Self {
        MinMax {
            min: value,
            max: value,
        }
    }

    /// Returns `true` if no value was ever observed.
    pub fn is_empty(&self) -> bool {
        self.min == f64::INFINITY && self.max == f64::NEG_INFINITY
    }

    /// Fold one value into the pair.
    #[inline]
    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Combine two pairs.
    #[inline]
    pub fn merge(self, other: MinMax) -> MinMax {
        MinMax {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for MinMax {
    fn default() -> Self {
        MinMax::EMPTY
    }
}

/// Result of one timed reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionOutcome<V> {
    /// The reduced value
    pub value: V,
    /// Wall-clock time of the parallel region only
    pub elapsed: Duration,
}

impl<V> ReductionOutcome<V> {
    /// Elapsed time in whole microseconds.
    pub fn elapsed_micros(&self) -> u64 {
        u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX)
    }

    /// Replace the value, keeping the timing.
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> ReductionOutcome<U> {
        ReductionOutcome {
            value: f(self.value),
            elapsed: self.elapsed,
        }
    }
}
