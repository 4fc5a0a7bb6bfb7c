//! Shared accumulators, one per synchronization discipline.
//!
//! Every accumulator owns the single piece of shared mutable state of a
//! reduction and guarantees that at most one worker is writing it at a time.

use std::sync::PoisonError;

use crate::strategies::combine::Combine;
use crate::sync::{AtomicU64, Mutex, MutexGuard, Ordering};

/// A reduction target that many workers merge partial results into.
pub trait SharedAccumulator<V>: Sync {
    /// Fold `partial` into the accumulated value.
    fn merge(&self, partial: V);

    /// Consume the accumulator, returning the accumulated value.
    fn into_inner(self) -> V;
}

/// `f64` sum updated with a single compare-and-swap instruction per merge.
///
/// The value lives in an `AtomicU64` as raw IEEE bits.
///
/// # Examples
///
/// ```
/// use sync_reductions::strategies::{AtomicSum, SharedAccumulator};
///
/// let sum = AtomicSum::new(0.0);
/// sum.merge(1.5);
/// sum.merge(2.0);
///
/// assert_eq!(sum.into_inner(), 3.5);
/// ```
// Align struct to cache size (Intel)
// This prevents false sharing of the accumulator with neighbouring data.
#[repr(align(64))]
#[derive(Debug)]
pub struct AtomicSum {
    bits: AtomicU64,
}

impl AtomicSum {
    /// Create a sum starting at `initial`.
    pub fn new(initial: f64) -> Self {
        AtomicSum {
            bits: AtomicU64::new(initial.to_bits()),
        }
    }

    /// Atomically add `value`.
    #[inline]
    pub fn add(&self, value: f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current value.
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl SharedAccumulator<f64> for AtomicSum {
    #[inline]
    fn merge(&self, partial: f64) {
        self.add(partial);
    }

    fn into_inner(self) -> f64 {
        self.load()
    }
}

/// Stand-in for an exclusive-update accumulator that cannot exist.
///
/// Hardware has no single-instruction update for combines such as `min` or
/// `max` on doubles. Operators without one use this uninhabited type, so an
/// exclusive-update reduction over them can never be constructed.
#[derive(Debug)]
pub enum NoExclusiveUpdate {}

impl<V> SharedAccumulator<V> for NoExclusiveUpdate {
    fn merge(&self, _partial: V) {
        match *self {}
    }

    fn into_inner(self) -> V {
        match self {}
    }
}

/// Accumulator guarded by a critical section.
///
/// The lock is private. Callers only ever see the accumulated value from
/// inside [`CriticalSection::enter`], which releases the region when the
/// closure returns.
pub struct CriticalSection<C: Combine> {
    op: C,
    value: Mutex<C::Value>,
}

impl<C: Combine> CriticalSection<C> {
    /// Create a region holding the operator's identity.
    pub fn new(op: C) -> Self {
        CriticalSection {
            op,
            value: Mutex::new(op.identity()),
        }
    }

    /// Run `f` with exclusive access to the accumulated value.
    pub fn enter<R>(&self, f: impl FnOnce(&mut C::Value) -> R) -> R {
        // A panic inside another region cannot leave a half-combined value
        // behind, so a poisoned lock is still safe to use.
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut value)
    }
}

impl<C: Combine> SharedAccumulator<C::Value> for CriticalSection<C> {
    #[inline]
    fn merge(&self, partial: C::Value) {
        let op = self.op;
        self.enter(|acc| *acc = op.combine(*acc, partial));
    }

    fn into_inner(self) -> C::Value {
        self.enter(|acc| *acc)
    }
}

/// Accumulator behind a lock that the caller acquires and releases.
///
/// Unlike [`CriticalSection`], the lock is an object in its own right and can
/// be held across several updates. Release happens when the [`LockGuard`] is
/// dropped or handed to [`release`](ExplicitLock::release), which covers early
/// returns and unwinding.
///
/// [`reduce`](crate::strategies::reduce) builds a fresh lock for every trial.
/// Callers that drive one lock through consecutive reductions themselves call
/// [`reset`](ExplicitLock::reset) in between.
///
/// # Examples
///
/// ```
/// use sync_reductions::strategies::{ExplicitLock, Sum};
///
/// let lock = ExplicitLock::new(Sum);
///
/// let mut guard = lock.acquire();
/// *guard += 4.0;
/// lock.release(guard);
///
/// assert_eq!(lock.value(), 4.0);
/// lock.reset();
/// assert_eq!(lock.value(), 0.0);
/// ```
pub struct ExplicitLock<C: Combine> {
    op: C,
    value: Mutex<C::Value>,
}

/// Proof of holding an [`ExplicitLock`].
pub struct LockGuard<'a, V> {
    inner: MutexGuard<'a, V>,
}

impl<C: Combine> ExplicitLock<C> {
    /// Create an unlocked lock holding the operator's identity.
    pub fn new(op: C) -> Self {
        ExplicitLock {
            op,
            value: Mutex::new(op.identity()),
        }
    }

    /// Block until the lock is free, then take it.
    pub fn acquire(&self) -> LockGuard<'_, C::Value> {
        LockGuard {
            inner: self.value.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Give the lock back.
    pub fn release(&self, guard: LockGuard<'_, C::Value>) {
        drop(guard);
    }

    /// Copy of the accumulated value.
    pub fn value(&self) -> C::Value {
        let guard = self.acquire();
        let value = *guard;
        self.release(guard);
        value
    }

    /// Put the identity back so the lock can serve another reduction.
    pub fn reset(&self) {
        let mut guard = self.acquire();
        *guard = self.op.identity();
        self.release(guard);
    }
}

impl<C: Combine> SharedAccumulator<C::Value> for ExplicitLock<C> {
    #[inline]
    fn merge(&self, partial: C::Value) {
        let mut guard = self.acquire();
        *guard = self.op.combine(*guard, partial);
        self.release(guard);
    }

    fn into_inner(self) -> C::Value {
        self.value()
    }
}

impl<V> std::ops::Deref for LockGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.inner
    }
}

impl<V> std::ops::DerefMut for LockGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.inner
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::data::MinMax;
    use crate::strategies::combine::{Max, MinAndMax, Sum};

    fn sync_only<T: Sync>(_: T) {}
    fn send_only<T: Send>(_: T) {}

    #[test]
    fn is_send() {
        send_only(AtomicSum::new(0.0));
        send_only(CriticalSection::new(Max));
        send_only(ExplicitLock::new(MinAndMax));
    }

    #[test]
    fn is_sync() {
        sync_only(AtomicSum::new(0.0));
        sync_only(CriticalSection::new(Max));
        sync_only(ExplicitLock::new(MinAndMax));
    }

    fn merge_from_threads<A>(accumulator: A, num_threads: usize, per_thread: usize) -> f64
    where
        A: SharedAccumulator<f64> + Send + 'static,
    {
        let accumulator = Arc::new(accumulator);
        let mut thread_handles = Vec::new();
        for _ in 0..num_threads {
            let accumulator_copy = accumulator.clone();
            let handle = thread::spawn(move || {
                for _ in 0..per_thread {
                    accumulator_copy.merge(1.0);
                }
            });

            thread_handles.push(handle);
        }

        thread_handles
            .into_iter()
            .for_each(|handle| handle.join().unwrap());

        match Arc::try_unwrap(accumulator) {
            Ok(accumulator) => accumulator.into_inner(),
            Err(_) => panic!("all workers joined"),
        }
    }

    #[test]
    fn concurrent_sums_lose_nothing() {
        const NUM_THREADS: usize = 8;
        const PER_THREAD: usize = 2_000;
        let expected = (NUM_THREADS * PER_THREAD) as f64;

        assert_eq!(merge_from_threads(AtomicSum::new(0.0), NUM_THREADS, PER_THREAD), expected);
        assert_eq!(
            merge_from_threads(CriticalSection::new(Sum), NUM_THREADS, PER_THREAD),
            expected
        );
        assert_eq!(
            merge_from_threads(ExplicitLock::new(Sum), NUM_THREADS, PER_THREAD),
            expected
        );
    }

    #[test]
    fn critical_section_min_max() {
        let region = CriticalSection::new(MinAndMax);
        region.merge(MinMax::of(3.0));
        region.merge(MinMax::of(-1.0));

        assert_eq!(region.into_inner(), MinMax { min: -1.0, max: 3.0 });
    }

    #[test]
    fn explicit_lock_released_after_panic() {
        let lock = ExplicitLock::new(Sum);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = lock.acquire();
            *guard += 1.0;
            panic!("worker failed while holding the lock");
        }));
        assert!(result.is_err());

        // the guard was dropped while unwinding, so this does not deadlock
        lock.merge(2.0);
        assert_eq!(lock.value(), 3.0);
    }

    #[test]
    fn explicit_lock_released_on_early_return() {
        fn merge_if_positive(lock: &ExplicitLock<Sum>, value: f64) -> Result<(), ()> {
            let mut guard = lock.acquire();
            if value < 0.0 {
                return Err(());
            }
            *guard += value;
            lock.release(guard);
            Ok(())
        }

        let lock = ExplicitLock::new(Sum);
        assert!(merge_if_positive(&lock, -1.0).is_err());
        assert!(merge_if_positive(&lock, 5.0).is_ok());
        assert_eq!(lock.value(), 5.0);
    }

    #[test]
    fn explicit_lock_reusable() {
        let lock = ExplicitLock::new(Max);
        lock.merge(7.0);
        assert_eq!(lock.value(), 7.0);

        lock.reset();
        assert_eq!(lock.value(), f64::NEG_INFINITY);
        lock.merge(2.0);
        assert_eq!(lock.value(), 2.0);
    }

    #[test]
    fn explicit_lock_consecutive_reductions() {
        let lock = Arc::new(ExplicitLock::new(Sum));

        for round in 1..=3 {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let lock = Arc::clone(&lock);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            lock.merge(round as f64);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(lock.value(), 400.0 * round as f64);
            lock.reset();
        }
        assert_eq!(lock.value(), 0.0);
    }
}
