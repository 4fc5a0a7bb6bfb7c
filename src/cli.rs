use std::path::PathBuf;

use clap::Parser;

use sync_reductions::{Granularity, Schedule, Strategy, Workload};

/// Scaling benchmark of synchronization disciplines for shared-accumulator reductions
#[derive(Parser, Debug)]
#[command(name = "sync-reductions", version, about)]
pub struct Args {
    /// Kernel to measure: matrix, triangular, extremes or dot
    #[arg(long, default_value = "matrix")]
    pub workload: Workload,

    /// Merge discipline: exclusive-update, critical-section, explicit-lock or builtin-reduction
    #[arg(long, default_value = "critical-section")]
    pub strategy: Strategy,

    /// Loop schedule: static, dynamic or guided, optionally as `kind,chunk`
    #[arg(long, default_value = "static")]
    pub schedule: Schedule,

    /// Chunk size for dynamic, minimum chunk for guided
    #[arg(long)]
    pub chunk: Option<usize>,

    /// How often workers merge: per-element or per-worker
    #[arg(long)]
    pub granularity: Option<Granularity>,

    /// Smallest thread count
    #[arg(long)]
    pub threads_min: Option<usize>,

    /// Largest thread count
    #[arg(long)]
    pub threads_max: Option<usize>,

    /// Problem sizes to sweep (e.g., 10,100,1K,9M)
    #[arg(long, value_delimiter = ',')]
    pub sizes: Option<Vec<String>>,

    /// Sweep profile: quick, standard or thorough
    #[arg(long)]
    pub profile: Option<String>,

    /// Split each row scan across this many inner workers
    #[arg(long, value_name = "INNER")]
    pub nested: Option<usize>,

    /// Run a requested inner level on the calling worker instead
    #[arg(long)]
    pub no_nested_support: bool,

    /// Generate the next size tier while measuring the current one
    #[arg(long)]
    pub pipelined: bool,

    /// Append records to this CSV file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print speedups per size after the sweep
    #[arg(long)]
    pub summary: bool,

    /// Thread count speedups are relative to
    #[arg(long, default_value_t = 1)]
    pub base_threads: usize,
}

impl Args {
    /// The schedule with `--chunk` applied.
    pub fn schedule(&self) -> Schedule {
        match self.chunk {
            Some(chunk) => self.schedule.with_chunk(chunk),
            None => self.schedule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["sync-reductions"]);

        assert_eq!(args.workload, Workload::FullMatrix);
        assert_eq!(args.strategy, Strategy::CriticalSection);
        assert_eq!(args.schedule(), Schedule::Static);
        assert_eq!(args.base_threads, 1);
        assert!(!args.pipelined);
    }

    #[test]
    fn chunk_overrides_schedule() {
        let args = Args::parse_from([
            "sync-reductions",
            "--schedule",
            "dynamic",
            "--chunk",
            "64",
            "--sizes",
            "10,1K",
        ]);

        assert_eq!(args.schedule(), Schedule::Dynamic { chunk: 64 });
        assert_eq!(args.sizes.unwrap(), vec!["10".to_string(), "1K".to_string()]);
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!(Args::try_parse_from(["sync-reductions", "--strategy", "spinlock"]).is_err());
    }
}
