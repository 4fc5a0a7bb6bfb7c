mod cli;

use std::process;

use clap::Parser;
use cli::Args;
use sync_reductions::config::{parse_sizes, profile, thread_range, PROFILES};
use sync_reductions::executor::Nesting;
use sync_reductions::report::summarize;
use sync_reductions::{CsvSink, Record, RecordSink, Sweep, Trial};

fn main() {
    env_logger::init();
    let args = Args::parse();

    let chosen = match args.profile.as_deref() {
        Some(name) => match profile(name, args.workload) {
            Some(p) => Some(p),
            None => {
                eprintln!("Unknown profile '{}'. Valid: {}", name, PROFILES.join(", "));
                process::exit(1);
            }
        },
        None => None,
    };

    // Resolve sizes: --sizes takes precedence, then --profile, then the workload's tiers
    let sizes = match (&args.sizes, &chosen) {
        (Some(raw), _) => parse_sizes(raw).unwrap_or_else(|e| {
            eprintln!("Error parsing sizes: {}", e);
            process::exit(1);
        }),
        (None, Some(p)) => p.sizes.clone(),
        (None, None) => args.workload.default_sizes(),
    };

    // Explicit bounds override the profile's thread counts
    let threads = match (args.threads_min, args.threads_max, &chosen) {
        (None, None, Some(p)) => p.threads.clone(),
        (min, max, _) => thread_range(min.unwrap_or(1), max.unwrap_or(16)).unwrap_or_else(|e| {
            eprintln!("{}", e);
            process::exit(1);
        }),
    };

    let mut trial = Trial::new(1, args.strategy)
        .with_schedule(args.schedule())
        .with_nested_supported(!args.no_nested_support);
    if let Some(granularity) = args.granularity {
        trial = trial.with_granularity(granularity);
    }
    if let Some(inner_workers) = args.nested {
        trial = trial.with_nesting(Nesting::Enabled { inner_workers });
    }

    let sweep = Sweep::new(args.workload, trial)
        .with_threads(threads)
        .with_sizes(sizes);

    println!("sync-reductions: {} via {}", sweep.workload, args.strategy);
    println!("  Schedule: {}", trial.plan.schedule);
    println!("  Granularity: {}", trial.plan.granularity());
    if let Some(inner) = args.nested {
        println!(
            "  Nested: {} inner workers{}",
            inner,
            if args.no_nested_support { " (unsupported, sequential)" } else { "" }
        );
    }
    println!("  Threads: {:?}", sweep.threads);
    println!("  Sizes: {:?}", sweep.sizes);
    if let Some(ref path) = args.output {
        println!("  CSV output: {}", path.display());
    }
    println!();

    let result = match args.output {
        Some(ref path) => {
            CsvSink::append_to(path).and_then(|mut sink| run(&sweep, &mut sink, args.pipelined))
        }
        None => run(&sweep, &mut Vec::<Record>::new(), args.pipelined),
    };

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!("{:>8} {:>12} {:>14}", "threads", "size", "time (us)");
    for record in &records {
        println!(
            "{:>8} {:>12} {:>14}",
            record.thread_count, record.problem_size, record.elapsed_microseconds
        );
    }

    if args.summary {
        println!();
        for tier in summarize(&records, args.base_threads) {
            println!("{}", tier);
        }
    }
}

fn run<S: RecordSink>(
    sweep: &Sweep,
    sink: &mut S,
    pipelined: bool,
) -> sync_reductions::Result<Vec<Record>> {
    if pipelined {
        sweep.run_pipelined(sink)
    } else {
        sweep.run(sink)
    }
}
