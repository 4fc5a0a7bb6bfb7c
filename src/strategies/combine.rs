//! Associative operators a reduction folds with.

use crate::data::MinMax;
use crate::strategies::accumulators::{AtomicSum, NoExclusiveUpdate, SharedAccumulator};

/// An associative, commutative operator together with its identity.
///
/// The operator also declares whether a hardware exclusive-update instruction
/// exists for it. Operators that have none set `Exclusive` to
/// [`NoExclusiveUpdate`], so the combination cannot be constructed at all.
pub trait Combine: Copy + Send + Sync {
    /// Type being reduced.
    type Value: Copy + Send + Sync;

    /// Lock-free accumulator driven by a single hardware update instruction.
    type Exclusive: SharedAccumulator<Self::Value>;

    /// Short name used in logs and error messages.
    const NAME: &'static str;

    /// The value that leaves any other value unchanged under [`Combine::combine`].
    fn identity(&self) -> Self::Value;

    /// Combine two partial results.
    fn combine(&self, a: Self::Value, b: Self::Value) -> Self::Value;

    /// An accumulator updated by a hardware instruction, or `None` if the
    /// instruction set has no such update for this operator.
    fn exclusive(&self) -> Option<Self::Exclusive>;
}

/// Floating point addition.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Combine for Sum {
    type Value = f64;
    type Exclusive = AtomicSum;

    const NAME: &'static str = "sum";

    fn identity(&self) -> f64 {
        0.0
    }

    #[inline]
    fn combine(&self, a: f64, b: f64) -> f64 {
        a + b
    }

    fn exclusive(&self) -> Option<AtomicSum> {
        Some(AtomicSum::new(self.identity()))
    }
}

/// Floating point maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl Combine for Max {
    type Value = f64;
    type Exclusive = NoExclusiveUpdate;

    const NAME: &'static str = "max";

    fn identity(&self) -> f64 {
        f64::NEG_INFINITY
    }

    #[inline]
    fn combine(&self, a: f64, b: f64) -> f64 {
        a.max(b)
    }

    fn exclusive(&self) -> Option<NoExclusiveUpdate> {
        None
    }
}

/// Simultaneous minimum and maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinAndMax;

impl Combine for MinAndMax {
    type Value = MinMax;
    type Exclusive = NoExclusiveUpdate;

    const NAME: &'static str = "min/max";

    fn identity(&self) -> MinMax {
        MinMax::EMPTY
    }

    #[inline]
    fn combine(&self, a: MinMax, b: MinMax) -> MinMax {
        a.merge(b)
    }

    fn exclusive(&self) -> Option<NoExclusiveUpdate> {
        None
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn check_identity<C: Combine>(op: C, samples: &[C::Value])
    where
        C::Value: PartialEq + std::fmt::Debug,
    {
        for &sample in samples {
            assert_eq!(op.combine(op.identity(), sample), sample);
            assert_eq!(op.combine(sample, op.identity()), sample);
        }
    }

    #[test]
    fn identities() {
        check_identity(Sum, &[0.0, -3.5, 1e300]);
        check_identity(Max, &[0.0, -3.5, f64::MIN]);
        check_identity(MinAndMax, &[MinMax::of(2.0), MinMax { min: -1.0, max: 1.0 }]);
    }

    #[test]
    fn only_sum_has_exclusive_update() {
        assert!(Sum.exclusive().is_some());
        assert!(Max.exclusive().is_none());
        assert!(MinAndMax.exclusive().is_none());
    }
}
