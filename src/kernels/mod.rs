//! The aggregation kernels.
//!
//! Each kernel exists twice. The [`sequential`] module holds single-threaded
//! reference implementations that serve as correctness oracles. The
//! [`reductions`] module expresses the same kernels as a [`Reduction`]: an
//! index range, the value each index contributes, and the associative
//! operator those values are combined with. Any strategy in
//! [`strategies`](crate::strategies) can drive a `Reduction`.

use std::ops::Range;

use crate::executor::InnerLevel;
use crate::strategies::Combine;

pub mod reductions;
pub mod sequential;

pub use self::reductions::{DotProduct, Extremes, MaxOfRowMins};

/// A kernel decomposed into independent per-index contributions.
///
/// The kernel's result is the fold of [`Reduction::item`] over
/// [`Reduction::indices`] with [`Reduction::op`], in any order and any
/// grouping.
pub trait Reduction: Sync {
    /// Operator the items are folded with.
    type Op: Combine;

    /// Short name used in logs.
    const NAME: &'static str;

    /// Returns the operator.
    fn op(&self) -> Self::Op;

    /// Indices of the outer loop.
    fn indices(&self) -> Range<usize>;

    /// Contribution of one outer index.
    ///
    /// Kernels with an inner loop of their own may split it across `inner`.
    fn item(&self, index: usize, inner: &InnerLevel) -> <Self::Op as Combine>::Value;
}

/// The value type a [`Reduction`] produces.
pub type ValueOf<R> = <<R as Reduction>::Op as Combine>::Value;
