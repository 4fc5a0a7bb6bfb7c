//! Speedup summaries of sweep records.

use std::collections::BTreeMap;
use std::fmt;

use crate::sweep::Record;

/// Speedup of one thread count relative to the base thread count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedupPoint {
    /// Thread count measured
    pub thread_count: usize,
    /// Elapsed time at that count
    pub elapsed_microseconds: u64,
    /// `base time / time`
    pub speedup: f64,
}

/// Speedups of every thread count measured for one problem size.
#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    /// Problem size of the tier
    pub problem_size: usize,
    /// Thread count the speedups are relative to
    pub base_threads: usize,
    /// One point per thread count, sorted by thread count
    pub points: Vec<SpeedupPoint>,
}

impl TierSummary {
    /// The point with the lowest elapsed time, preferring fewer threads on ties.
    pub fn fastest(&self) -> Option<&SpeedupPoint> {
        self.points
            .iter()
            .min_by_key(|point| (point.elapsed_microseconds, point.thread_count))
    }

    /// The highest speedup reached.
    pub fn best_speedup(&self) -> f64 {
        self.fastest().map_or(1.0, |point| point.speedup)
    }
}

impl fmt::Display for TierSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "n = {} (speedup vs {} thread{})",
            self.problem_size,
            self.base_threads,
            if self.base_threads == 1 { "" } else { "s" }
        )?;
        writeln!(f, "  {:>8} {:>14} {:>8}", "threads", "time (us)", "speedup")?;
        for point in &self.points {
            writeln!(
                f,
                "  {:>8} {:>14} {:>8.2}",
                point.thread_count, point.elapsed_microseconds, point.speedup
            )?;
        }
        if let Some(fastest) = self.fastest() {
            write!(
                f,
                "  fastest: {} threads, {:.2}x",
                fastest.thread_count, fastest.speedup
            )?;
        }
        Ok(())
    }
}

/// Group `records` by problem size and compute speedups against
/// `base_threads`.
///
/// Times below one microsecond count as one. Tiers without a record at
/// `base_threads` are left out. If a thread count was measured more than once
/// for a size, the last measurement wins.
///
/// # Examples
///
/// ```
/// use sync_reductions::report::summarize;
/// use sync_reductions::Record;
///
/// let records = [
///     Record { thread_count: 1, problem_size: 100, elapsed_microseconds: 800 },
///     Record { thread_count: 4, problem_size: 100, elapsed_microseconds: 200 },
/// ];
/// let summary = summarize(&records, 1);
///
/// assert_eq!(summary[0].best_speedup(), 4.0);
/// assert_eq!(summary[0].fastest().unwrap().thread_count, 4);
/// ```
pub fn summarize(records: &[Record], base_threads: usize) -> Vec<TierSummary> {
    let mut tiers: BTreeMap<usize, BTreeMap<usize, u64>> = BTreeMap::new();
    for record in records {
        tiers
            .entry(record.problem_size)
            .or_default()
            .insert(record.thread_count, record.elapsed_microseconds);
    }

    tiers
        .into_iter()
        .filter_map(|(problem_size, times)| {
            let base = match times.get(&base_threads) {
                Some(&base) => base.max(1) as f64,
                None => {
                    log::warn!(
                        "n={} has no measurement at {} threads, leaving it out of the summary",
                        problem_size,
                        base_threads
                    );
                    return None;
                }
            };

            let points = times
                .into_iter()
                .map(|(thread_count, elapsed_microseconds)| SpeedupPoint {
                    thread_count,
                    elapsed_microseconds,
                    speedup: base / elapsed_microseconds.max(1) as f64,
                })
                .collect();

            Some(TierSummary {
                problem_size,
                base_threads,
                points,
            })
        })
        .collect()
}
