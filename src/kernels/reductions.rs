use std::ops::Range;

use crate::data::{Matrix, MinMax, VectorPair};
use crate::error::{Error, Result};
use crate::executor::InnerLevel;
use crate::kernels::Reduction;
use crate::strategies::{Max, MinAndMax, Sum};

/// Maximum of the row minimums of a [`Matrix`] of either shape.
///
/// One index per row. Each row's minimum is scanned over the populated part
/// of the row only, using the inner level when nesting is active.
#[derive(Debug, Clone, Copy)]
pub struct MaxOfRowMins<'a> {
    matrix: &'a Matrix,
}

impl<'a> MaxOfRowMins<'a> {
    /// Returns a reduction over `matrix`.
    pub fn new(matrix: &'a Matrix) -> Self {
        MaxOfRowMins { matrix }
    }
}

impl Reduction for MaxOfRowMins<'_> {
    type Op = Max;

    const NAME: &'static str = "max-of-row-mins";

    fn op(&self) -> Max {
        Max
    }

    fn indices(&self) -> Range<usize> {
        0..self.matrix.n()
    }

    #[inline]
    fn item(&self, index: usize, inner: &InnerLevel) -> f64 {
        inner.min(self.matrix.row(index))
    }
}

/// Minimum and maximum of a vector, skipping index 0.
#[derive(Debug, Clone, Copy)]
pub struct Extremes<'a> {
    values: &'a [f64],
}

impl<'a> Extremes<'a> {
    /// Returns a reduction over `values`.
    pub fn new(values: &'a [f64]) -> Self {
        Extremes { values }
    }
}

impl Reduction for Extremes<'_> {
    type Op = MinAndMax;

    const NAME: &'static str = "extremes";

    fn op(&self) -> MinAndMax {
        MinAndMax
    }

    fn indices(&self) -> Range<usize> {
        // Index 0 is never visited, see `sequential::extremes`.
        self.values.len().min(1)..self.values.len()
    }

    #[inline]
    fn item(&self, index: usize, _inner: &InnerLevel) -> MinMax {
        MinMax::of(self.values[index])
    }
}

/// Sum of pairwise products of two equally long vectors.
#[derive(Debug, Clone, Copy)]
pub struct DotProduct<'a> {
    left: &'a [f64],
    right: &'a [f64],
}

impl<'a> DotProduct<'a> {
    /// Returns a reduction over a pair already known to match in length.
    pub fn new(pair: &'a VectorPair) -> Self {
        DotProduct {
            left: pair.left(),
            right: pair.right(),
        }
    }

    /// Returns a reduction over two slices, rejecting a length mismatch.
    pub fn from_slices(left: &'a [f64], right: &'a [f64]) -> Result<Self> {
        if left.len() != right.len() {
            return Err(Error::LengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        Ok(DotProduct { left, right })
    }
}

impl Reduction for DotProduct<'_> {
    type Op = Sum;

    const NAME: &'static str = "dot-product";

    fn op(&self) -> Sum {
        Sum
    }

    fn indices(&self) -> Range<usize> {
        0..self.left.len()
    }

    #[inline]
    fn item(&self, index: usize, _inner: &InnerLevel) -> f64 {
        self.left[index] * self.right[index]
    }
}
