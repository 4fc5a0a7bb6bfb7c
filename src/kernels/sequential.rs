//! Single-threaded reference implementations.
//!
//! Plain loops. They share no code with the parallel reductions they are
//! checked against.

use crate::data::{Matrix, MinMax};
use crate::error::{Error, Result};

/// Maximum over all rows of the row's minimum.
///
/// Only the populated part of each row is read (see [`Matrix::row`]), so the
/// cells below the diagonal of an upper-triangular matrix are never touched.
/// An empty matrix yields `-inf`.
///
/// # Examples
///
/// ```
/// use sync_reductions::{kernels::sequential, Matrix, Shape};
///
/// let full = Matrix::from_rows(Shape::Full, vec![vec![4.0, 2.0], vec![7.0, 1.0]]).unwrap();
/// assert_eq!(sequential::max_of_row_mins(&full), 2.0);
///
/// let upper = Matrix::from_rows(
///     Shape::UpperTriangular,
///     vec![vec![3.0, 8.0], vec![f64::NAN, 5.0]],
/// )
/// .unwrap();
/// assert_eq!(sequential::max_of_row_mins(&upper), 5.0);
/// ```
pub fn max_of_row_mins(matrix: &Matrix) -> f64 {
    let mut max_of_mins = f64::NEG_INFINITY;

    for i in 0..matrix.n() {
        let row = matrix.row(i);
        // The first populated cell (the diagonal, for triangular input) seeds the minimum.
        let mut row_min = row[0];
        for &value in &row[1..] {
            if value < row_min {
                row_min = value;
            }
        }

        if row_min > max_of_mins {
            max_of_mins = row_min;
        }
    }

    max_of_mins
}

/// Minimum and maximum of `values`, skipping index 0.
///
/// Skipping the first element is a long-standing convention of this
/// benchmark and is kept so that results stay comparable with earlier runs.
/// Inputs with fewer than two elements leave [`MinMax::EMPTY`] untouched.
///
/// # Examples
///
/// ```
/// use sync_reductions::{kernels::sequential, MinMax};
///
/// let extremes = sequential::extremes(&[5.0, 1.0, 9.0, 3.0]);
///
/// assert_eq!(extremes, MinMax { min: 1.0, max: 9.0 });
/// ```
pub fn extremes(values: &[f64]) -> MinMax {
    let mut result = MinMax::EMPTY;
    for &value in values.iter().skip(1) {
        result.observe(value);
    }
    result
}

/// Sum of pairwise products.
///
/// Fails with [`Error::LengthMismatch`] instead of truncating the longer
/// input.
pub fn dot_product(left: &[f64], right: &[f64]) -> Result<f64> {
    if left.len() != right.len() {
        return Err(Error::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let mut sum = 0.0;
    for i in 0..left.len() {
        sum += left[i] * right[i];
    }
    Ok(sum)
}
