//! Uniformly distributed input data.

use std::ops::Range;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::{Matrix, Shape, VectorPair};

/// Default range values are drawn from.
pub const DEFAULT_RANGE: Range<f64> = 1.0..1000.0;

/// Source of random vectors and matrices.
///
/// Seeded from the operating system unless built with [`DataGenerator::with_seed`].
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    /// Create a generator seeded from system entropy.
    pub fn new() -> Self {
        DataGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a generator with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        DataGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` values drawn from `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` is empty.
    pub fn vector(&mut self, count: usize, range: Range<f64>) -> Vec<f64> {
        let dist = Uniform::from(range);
        dist.sample_iter(&mut self.rng).take(count).collect()
    }

    /// Two independent vectors of `count` values each.
    pub fn vector_pair(&mut self, count: usize, range: Range<f64>) -> VectorPair {
        let left = self.vector(count, range.clone());
        let right = self.vector(count, range);
        VectorPair::new(left, right).expect("generated vectors share a length")
    }

    /// An `n x n` matrix.
    ///
    /// For [`Shape::UpperTriangular`] the cells below the diagonal are left at
    /// zero and only the populated cells consume random draws.
    pub fn matrix(&mut self, n: usize, shape: Shape, range: Range<f64>) -> Matrix {
        let dist = Uniform::from(range);
        let mut cells = vec![0.0; n * n];

        for (i, row) in cells.chunks_exact_mut(n.max(1)).take(n).enumerate() {
            let first = match shape {
                Shape::Full => 0,
                Shape::UpperTriangular => i,
            };
            for cell in &mut row[first..] {
                *cell = dist.sample(&mut self.rng);
            }
        }

        Matrix::from_flat(n, shape, cells).expect("buffer allocated as n * n")
    }
}

impl Default for DataGenerator {
    fn default() -> Self {
        DataGenerator::new()
    }
}
