//! Surge benchmark tool.
//!
//! Drives a benchmark profile against the simulated store and writes the
//! result log.
//!
//! # Usage
//!
//! ```bash
//! # Built-in profile
//! surge-bench run --profile cycles
//!
//! # TOML profile with overrides
//! surge-bench run --config bench.toml --rps 800 --duration 30 --output out.json
//!
//! # Find the concurrency at which the store starts failing
//! surge-bench probe --max-concurrency 128 --failure-threshold 0.02
//!
//! # List built-in profiles, or print one as TOML
//! surge-bench profiles
//! surge-bench profiles --show steady
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::uninlined_format_args)] // Format string style not critical

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use surge_workload::{
    builtin_profiles, list_profiles, load_profile, probe, verify_reads, BenchmarkProfile,
    ExecutionMode, Executor, KeyRegistry, MemoryStore, OperationGenerator, ProbeConfig,
    ResultSink,
};

/// Surge benchmark tool.
#[derive(Parser, Debug)]
#[command(name = "surge-bench")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

/// Where the profile comes from.
#[derive(clap::Args, Debug)]
struct ProfileSource {
    /// Built-in profile name.
    #[arg(long, default_value = "baseline", conflicts_with = "config")]
    profile: String,

    /// TOML profile file.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ProfileSource {
    fn load(&self) -> Result<BenchmarkProfile, surge_workload::ConfigError> {
        match &self.config {
            Some(path) => BenchmarkProfile::from_file(path),
            None => load_profile(&self.profile),
        }
    }
}

/// Benchmark command.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run a benchmark.
    Run {
        #[command(flatten)]
        source: ProfileSource,

        /// Dispatch model (open-loop, closed-loop).
        #[arg(long)]
        mode: Option<ExecutionMode>,

        /// Open-loop target rate; disables any rate pattern.
        #[arg(long)]
        rps: Option<u64>,

        /// Worker count.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Measured duration in seconds.
        #[arg(long)]
        duration: Option<f64>,

        /// Warm-up duration in seconds.
        #[arg(long)]
        warmup: Option<f64>,

        /// Fraction of operations that are writes.
        #[arg(long)]
        write_ratio: Option<f64>,

        /// Random seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Result log path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Read back this many written keys after the run.
        #[arg(long, default_value = "0")]
        verify: usize,
    },

    /// Step concurrency up until the store starts failing.
    Probe {
        #[command(flatten)]
        source: ProfileSource,

        /// Highest concurrency to try.
        #[arg(long, default_value = "64")]
        max_concurrency: u32,

        /// Failure rate above which the store counts as saturated.
        #[arg(long, default_value = "0.05")]
        failure_threshold: f64,

        /// Random seed.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List built-in profiles.
    Profiles {
        /// Print this profile as TOML.
        #[arg(long)]
        show: Option<String>,
    },
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64)
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, stopping benchmark");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_benchmark(
    mut profile: BenchmarkProfile,
    mode: Option<ExecutionMode>,
    rps: Option<u64>,
    concurrency: Option<u32>,
    duration: Option<f64>,
    warmup: Option<f64>,
    write_ratio: Option<f64>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    verify: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let bench = &mut profile.benchmark;
    if let Some(mode) = mode {
        bench.mode = mode;
    }
    if let Some(rps) = rps {
        bench.requests_per_second = rps;
        bench.rate_pattern.enabled = false;
    }
    if let Some(concurrency) = concurrency {
        bench.concurrency = concurrency;
    }
    if let Some(duration) = duration {
        bench.duration_secs = duration;
    }
    if let Some(warmup) = warmup {
        bench.warmup_secs = warmup;
    }
    if let Some(write_ratio) = write_ratio {
        bench.write_ratio = write_ratio;
    }
    if seed.is_some() {
        bench.seed = seed;
    }
    if let Some(output) = output {
        profile.sink.path = output;
    }
    profile.validate()?;

    info!(
        profile = %profile.name,
        mode = %profile.benchmark.mode,
        output = %profile.sink.path.display(),
        "Loaded profile"
    );

    let store = Arc::new(MemoryStore::new(&profile.store));
    let sink = ResultSink::create(&profile.sink).await?;
    let registry = KeyRegistry::new();
    let executor = Executor::new(profile.benchmark.clone(), Arc::clone(&store), sink.handle())?
        .with_registry(registry.clone());
    cancel_on_ctrl_c(executor.cancellation_token());

    let result = executor.run().await;
    // Close the array even if the run failed.
    let (_, summary) = sink.shutdown().await?;
    let stats = result?;

    stats.print_summary();
    println!(
        "Result log: {} ({} entries in {} batches)",
        profile.sink.path.display(),
        summary.entries,
        summary.batches
    );

    if verify > 0 {
        let mut rng = seeded_rng(profile.benchmark.seed);
        let report = verify_reads(store.as_ref(), &registry, verify, &mut rng).await;
        report.print_summary();
        if !report.is_clean() {
            return Err(format!("{} read verification violations", report.violations.len()).into());
        }
    }
    Ok(())
}

async fn run_probe(
    profile: BenchmarkProfile,
    config: ProbeConfig,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    profile.validate()?;
    let store = MemoryStore::new(&profile.store);
    let generator = OperationGenerator::new(profile.benchmark.templates, KeyRegistry::new());
    let mut rng = seeded_rng(seed);

    let report = probe(&store, &generator, &config, &mut rng).await?;
    report.print_summary();
    Ok(())
}

fn show_profiles(show: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(name) = show {
        print!("{}", load_profile(&name)?.to_toml());
        return Ok(());
    }

    let profiles = builtin_profiles();
    for name in list_profiles() {
        if let Some(profile) = profiles.get(name) {
            println!("{:<10} {}", name, profile.description);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the summaries.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Run {
            source,
            mode,
            rps,
            concurrency,
            duration,
            warmup,
            write_ratio,
            seed,
            output,
            verify,
        } => {
            run_benchmark(
                source.load()?,
                mode,
                rps,
                concurrency,
                duration,
                warmup,
                write_ratio,
                seed,
                output,
                verify,
            )
            .await?;
        }
        Command::Probe {
            source,
            max_concurrency,
            failure_threshold,
            seed,
        } => {
            let config = ProbeConfig {
                max_concurrency,
                failure_threshold,
            };
            run_probe(source.load()?, config, seed).await?;
        }
        Command::Profiles { show } => show_profiles(show)?,
    }

    Ok(())
}
