//! The experiment harness: thread counts times size tiers.
//!
//! A [`Sweep`] generates one input per size tier and measures it once per
//! thread count. Every measurement becomes a [`Record`] that is handed to a
//! [`RecordSink`] as soon as it exists, so a long sweep that dies halfway
//! still leaves the finished rows on disk.
//!
//! [`Sweep::run_pipelined`] does the same work with the generation of tier
//! `k + 1` overlapping the measurements of tier `k`.

use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use std::thread;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::config::{default_tiers, geometric_sizes};
use crate::data::Shape;
use crate::error::{Error, Result};
use crate::executor::{Nesting, WorkerCount};
use crate::generate::{DataGenerator, DEFAULT_RANGE};
use crate::strategies::{Combine, Max, MinAndMax, Strategy, Sum};
use crate::trial::{Input, Trial};

/// Kernel and input shape a sweep measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    /// Max-of-row-mins over an `n x n` matrix
    FullMatrix,
    /// Max-of-row-mins over an upper-triangular `n x n` matrix
    TriangularMatrix,
    /// Extremes of an `n`-element vector
    Extremes,
    /// Dot product of two `n`-element vectors
    DotProduct,
}

impl Workload {
    /// All workloads.
    pub const ALL: [Workload; 4] = [
        Workload::FullMatrix,
        Workload::TriangularMatrix,
        Workload::Extremes,
        Workload::DotProduct,
    ];

    /// Name accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Workload::FullMatrix => "matrix",
            Workload::TriangularMatrix => "triangular",
            Workload::Extremes => "extremes",
            Workload::DotProduct => "dot",
        }
    }

    /// Size tiers measured when none are given.
    pub fn default_sizes(self) -> Vec<usize> {
        let (base, ceiling) = default_tiers(self);
        geometric_sizes(base, ceiling)
    }

    /// Name of the combine operator the workload reduces with.
    pub fn operator(self) -> &'static str {
        match self {
            Workload::FullMatrix | Workload::TriangularMatrix => Max::NAME,
            Workload::Extremes => MinAndMax::NAME,
            Workload::DotProduct => Sum::NAME,
        }
    }

    /// Returns `true` if `strategy` can reduce this workload.
    pub fn supports(self, strategy: Strategy) -> bool {
        strategy != Strategy::ExclusiveUpdate || self == Workload::DotProduct
    }

    /// Draw an input of the given size.
    pub fn generate(self, gen: &mut DataGenerator, size: usize, range: Range<f64>) -> Input {
        match self {
            Workload::FullMatrix => Input::Matrix(gen.matrix(size, Shape::Full, range)),
            Workload::TriangularMatrix => {
                Input::Matrix(gen.matrix(size, Shape::UpperTriangular, range))
            }
            Workload::Extremes => Input::Vector(gen.vector(size, range)),
            Workload::DotProduct => Input::Pair(gen.vector_pair(size, range)),
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matrix" | "full" => Ok(Workload::FullMatrix),
            "triangular" | "upper" => Ok(Workload::TriangularMatrix),
            "extremes" | "minmax" => Ok(Workload::Extremes),
            "dot" | "scalar" => Ok(Workload::DotProduct),
            other => Err(format!(
                "unknown workload '{}': expected matrix, triangular, extremes or dot",
                other
            )),
        }
    }
}

/// One persisted measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Outer workers of the trial
    pub thread_count: usize,
    /// Matrix side length or vector length
    pub problem_size: usize,
    /// Wall-clock time of the parallel region
    pub elapsed_microseconds: u64,
}

/// Destination of sweep records.
pub trait RecordSink {
    /// Persist one record.
    fn append(&mut self, record: &Record) -> Result<()>;

    /// Push buffered records to their destination.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<Record> {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.push(*record);
        Ok(())
    }
}

/// Writes records as CSV rows with a
/// `thread_count,problem_size,elapsed_microseconds` header.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    /// Write records to `writer`, preceded by the header if `write_header` is set.
    pub fn new(writer: W, write_header: bool) -> Self {
        CsvSink {
            writer: csv::WriterBuilder::new()
                .has_headers(write_header)
                .from_writer(writer),
        }
    }
}

impl CsvSink<File> {
    /// Open `path` for appending, creating it if needed.
    ///
    /// The header is only written when the file is empty, so repeated runs
    /// accumulate rows under a single header.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let write_header = file.metadata()?.len() == 0;
        log::debug!(
            "appending records to {} (header: {})",
            path.display(),
            write_header
        );
        Ok(CsvSink::new(file, write_header))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Thread counts, size tiers and the trial template they are applied to.
#[derive(Debug, Clone)]
pub struct Sweep {
    /// What gets reduced
    pub workload: Workload,
    /// Thread counts, measured in this order within each tier
    pub threads: Vec<usize>,
    /// Size tiers, measured in this order
    pub sizes: Vec<usize>,
    /// Plan and nesting of every trial; the worker count is overridden
    pub trial: Trial,
    /// Range input values are drawn from
    pub value_range: Range<f64>,
}

impl Sweep {
    /// Sweep over 1..=16 threads and the workload's default tiers.
    pub fn new(workload: Workload, trial: Trial) -> Self {
        Sweep {
            workload,
            threads: (1..=16).collect(),
            sizes: workload.default_sizes(),
            trial,
            value_range: DEFAULT_RANGE,
        }
    }

    /// Replace the thread counts.
    pub fn with_threads(mut self, threads: Vec<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Replace the size tiers.
    pub fn with_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.sizes = sizes;
        self
    }

    /// Replace the value range.
    pub fn with_value_range(mut self, range: Range<f64>) -> Self {
        self.value_range = range;
        self
    }

    /// Number of records a complete run produces.
    pub fn len(&self) -> usize {
        self.threads.len() * self.sizes.len()
    }

    /// Returns `true` if the sweep has no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject a sweep that could not produce its full result set.
    pub fn validate(&self) -> Result<()> {
        if self.threads.is_empty() {
            return Err(Error::InvalidSweep("no thread counts".to_string()));
        }
        if self.sizes.is_empty() {
            return Err(Error::InvalidSweep("no problem sizes".to_string()));
        }
        if let Some(dup) = first_duplicate(&self.threads) {
            return Err(Error::InvalidSweep(format!("thread count {} listed twice", dup)));
        }
        if let Some(dup) = first_duplicate(&self.sizes) {
            return Err(Error::InvalidSweep(format!("size {} listed twice", dup)));
        }
        for &threads in &self.threads {
            WorkerCount::new(threads)?;
        }
        if let Nesting::Enabled { inner_workers } = self.trial.nesting {
            if self.trial.nested_supported {
                WorkerCount::new(inner_workers)?;
            }
        }

        let Range { start, end } = self.value_range;
        if !(start.is_finite() && end.is_finite() && start < end) {
            return Err(Error::InvalidSweep(format!(
                "value range {}..{} is empty or not finite",
                start, end
            )));
        }
        if !(end - start).is_finite() {
            return Err(Error::InvalidSweep(format!(
                "value range {}..{} is too wide to sample",
                start, end
            )));
        }

        self.trial.plan.schedule.validate()?;
        let strategy = self.trial.plan.strategy;
        if !self.workload.supports(strategy) {
            log::error!(
                "{} requested for the {} workload, which reduces with `{}`",
                strategy,
                self.workload,
                self.workload.operator()
            );
            return Err(Error::UnsupportedCombination {
                strategy,
                operator: self.workload.operator(),
            });
        }
        Ok(())
    }

    /// Generate and measure one tier at a time.
    pub fn run<S: RecordSink>(&self, sink: &mut S) -> Result<Vec<Record>> {
        self.validate()?;
        let mut gen = DataGenerator::new();
        let mut records = Vec::with_capacity(self.len());

        for &size in &self.sizes {
            let input = self.workload.generate(&mut gen, size, self.value_range.clone());
            self.measure_tier(&input, sink, &mut records)?;
        }

        sink.flush()?;
        Ok(records)
    }

    /// Like [`Sweep::run`], with a producer thread generating the next tier
    /// while the current one is measured.
    ///
    /// At most one generated tier waits in the hand-off, which bounds memory
    /// to two tiers at a time.
    pub fn run_pipelined<S: RecordSink>(&self, sink: &mut S) -> Result<Vec<Record>> {
        self.validate()?;
        let (tx, rx) = crossbeam_channel::bounded::<Input>(1);

        thread::scope(|s| {
            let workload = self.workload;
            let sizes = &self.sizes;
            let range = self.value_range.clone();
            s.spawn(move || {
                let mut gen = DataGenerator::new();
                for &size in sizes {
                    let input = workload.generate(&mut gen, size, range.clone());
                    if tx.send(input).is_err() {
                        log::debug!("measurement stopped, producer exits before n={}", size);
                        break;
                    }
                }
            });

            // `rx` is dropped when this returns, unblocking the producer on error.
            self.consume(rx, sink)
        })
    }

    fn consume<S: RecordSink>(
        &self,
        inputs: Receiver<Input>,
        sink: &mut S,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(self.len());
        for input in inputs.iter() {
            self.measure_tier(&input, sink, &mut records)?;
        }
        sink.flush()?;
        Ok(records)
    }

    fn measure_tier<S: RecordSink>(
        &self,
        input: &Input,
        sink: &mut S,
        records: &mut Vec<Record>,
    ) -> Result<()> {
        log::info!(
            "{} n={}: {} via {} on {} thread counts",
            input.kernel_name(),
            input.size(),
            self.workload,
            self.trial.plan.strategy,
            self.threads.len()
        );

        for &threads in &self.threads {
            let trial = self.trial.with_workers(threads);
            let outcome = match trial
                .executor()
                .and_then(|executor| trial.run_on(&executor, input))
            {
                Ok(outcome) => outcome,
                Err(err) if err.is_configuration() => {
                    log::warn!("skipping W={} n={}: {}", threads, input.size(), err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let record = Record {
                thread_count: threads,
                problem_size: input.size(),
                elapsed_microseconds: outcome.elapsed_micros(),
            };
            sink.append(&record)?;
            records.push(record);
        }
        Ok(())
    }
}

fn first_duplicate(values: &[usize]) -> Option<usize> {
    let mut seen = HashSet::new();
    values.iter().copied().find(|&value| !seen.insert(value))
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::executor::MAX_WORKERS;

    fn small(workload: Workload, strategy: Strategy) -> Sweep {
        Sweep::new(workload, Trial::new(1, strategy))
            .with_threads(vec![1, 2, 3])
            .with_sizes(vec![10, 40])
    }

    #[test]
    fn one_record_per_point() {
        let sweep = small(Workload::TriangularMatrix, Strategy::ExplicitLock);
        let mut sink: Vec<Record> = Vec::new();
        let records = sweep.run(&mut sink).unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(records, sink);
        let points: HashSet<_> = records
            .iter()
            .map(|r| (r.thread_count, r.problem_size))
            .collect();
        assert_eq!(points.len(), 6);
    }

    #[test]
    fn pipelined_matches_sequential_points() {
        let sweep = small(Workload::DotProduct, Strategy::ExclusiveUpdate);
        let mut sink: Vec<Record> = Vec::new();
        let records = sweep.run_pipelined(&mut sink).unwrap();

        let points: Vec<_> = records
            .iter()
            .map(|r| (r.problem_size, r.thread_count))
            .collect();
        assert_eq!(points, vec![(10, 1), (10, 2), (10, 3), (40, 1), (40, 2), (40, 3)]);
    }

    #[test]
    fn validation() {
        let ok = small(Workload::Extremes, Strategy::CriticalSection);
        assert!(ok.validate().is_ok());

        let bad = ok.clone().with_threads(vec![]);
        assert!(matches!(bad.validate(), Err(Error::InvalidSweep(_))));

        let bad = ok.clone().with_sizes(vec![10, 10]);
        assert!(matches!(bad.validate(), Err(Error::InvalidSweep(_))));

        let bad = ok.clone().with_threads(vec![0, 1]);
        assert!(matches!(bad.validate(), Err(Error::InvalidWorkerCount { .. })));

        let bad = ok.clone().with_value_range(5.0..5.0);
        assert!(matches!(bad.validate(), Err(Error::InvalidSweep(_))));

        let bad = ok.clone().with_value_range(-f64::MAX..f64::MAX);
        assert!(matches!(bad.validate(), Err(Error::InvalidSweep(_))));

        let hazard = small(Workload::Extremes, Strategy::ExclusiveUpdate);
        assert!(matches!(
            hazard.validate(),
            Err(Error::UnsupportedCombination { operator: "min/max", .. })
        ));
    }

    #[test]
    fn overflowing_value_range_fails_before_sampling() {
        let sweep = small(Workload::Extremes, Strategy::CriticalSection)
            .with_value_range(-f64::MAX..f64::MAX);

        assert!(matches!(sweep.run(&mut Vec::<Record>::new()), Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn zero_inner_workers_fail_the_whole_sweep() {
        for &inner_workers in &[0, MAX_WORKERS + 1] {
            let mut sweep = small(Workload::FullMatrix, Strategy::CriticalSection);
            sweep.trial = sweep.trial.with_nesting(Nesting::Enabled { inner_workers });

            let mut sink: Vec<Record> = Vec::new();
            assert!(matches!(sweep.run(&mut sink), Err(Error::InvalidWorkerCount { .. })));
            assert!(matches!(
                sweep.run_pipelined(&mut sink),
                Err(Error::InvalidWorkerCount { .. })
            ));
            assert!(sink.is_empty());

            // without nested support the inner count is never used
            sweep.trial = sweep.trial.with_nested_supported(false);
            assert_eq!(sweep.run(&mut sink).unwrap().len(), 6);
        }
    }

    #[test]
    fn configuration_error_skips_only_its_point() {
        // bypasses `validate` to reach a trial that cannot be configured
        let sweep =
            small(Workload::DotProduct, Strategy::ExplicitLock).with_threads(vec![1, 0, 2]);
        let input = sweep
            .workload
            .generate(&mut DataGenerator::with_seed(1), 50, DEFAULT_RANGE);

        let mut sink: Vec<Record> = Vec::new();
        let mut records = Vec::new();
        sweep.measure_tier(&input, &mut sink, &mut records).unwrap();

        let threads: Vec<_> = records.iter().map(|r| r.thread_count).collect();
        assert_eq!(threads, vec![1, 2]);
        assert!(records.iter().all(|r| r.problem_size == 50));
        assert_eq!(sink, records);
    }

    #[test]
    fn workload_names() {
        for &workload in &Workload::ALL {
            assert_eq!(workload.name().parse::<Workload>().unwrap(), workload);
        }
        assert!("cube".parse::<Workload>().is_err());
        assert_eq!(Workload::FullMatrix.default_sizes(), vec![10, 100, 1_000, 10_000]);
    }

    #[test]
    fn csv_sink_writes_header_once() {
        let mut buffer = Vec::new();
        {
            let mut sink = CsvSink::new(&mut buffer, true);
            sink.append(&Record {
                thread_count: 2,
                problem_size: 100,
                elapsed_microseconds: 17,
            })
            .unwrap();
            sink.flush().unwrap();
        }

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "thread_count,problem_size,elapsed_microseconds\n2,100,17\n");
    }
}
