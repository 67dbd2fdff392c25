//! ttlcell CLI
//!
//! Command-line harness for TTL-gated value cells.

mod watch;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ttlcell_cache::{SharedTtlCell, TtlCell};
use ttlcell_core::{ttl_millis, NegativeTtlPolicy, TtlConfig};

use crate::watch::{FileWatcher, Poll};

/// ttlcell - time-bounded value memoization
#[derive(Parser)]
#[command(name = "ttlcell")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON config file for the TTL settings
    #[arg(long, global = true, env = "TTLCELL_CONFIG")]
    config: Option<PathBuf>,

    /// TTL in milliseconds (negative values are clamped to zero unless --strict)
    #[arg(long, global = true, env = "TTLCELL_TTL_MS", allow_negative_numbers = true)]
    ttl_ms: Option<i64>,

    /// Reject negative TTLs instead of clamping them
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a file, re-reading it at most once per TTL
    Watch {
        /// File to poll
        path: PathBuf,
        /// Poll interval in milliseconds
        #[arg(short, long, default_value = "250")]
        interval_ms: u64,
        /// Stop after this many polls
        #[arg(short, long)]
        count: Option<u64>,
    },

    /// Measure hit and miss paths
    Bench {
        /// Number of accesses per measurement
        #[arg(short, long, default_value = "100000")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "ttlcell=debug,ttlcell_cache=debug,info"
    } else {
        "ttlcell=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => TtlConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TtlConfig::default(),
    };
    if cli.strict {
        config.negative_ttl = NegativeTtlPolicy::Reject;
    }
    let ttl = match cli.ttl_ms {
        Some(ms) => config.resolve_ttl_millis(ms).context("Invalid --ttl-ms")?,
        None => config.default_ttl(),
    };

    match cli.command {
        Commands::Watch {
            path,
            interval_ms,
            count,
        } => cmd_watch(path, ttl, Duration::from_millis(interval_ms), count).await,
        Commands::Bench { count } => cmd_bench(count, ttl),
    }
}

async fn cmd_watch(path: PathBuf, ttl: Duration, interval: Duration, count: Option<u64>) -> Result<()> {
    info!(path = %path.display(), ttl_ms = ttl_millis(ttl), "watching");
    println!(
        "{} {} (ttl {:?}, every {:?})",
        "👀 Watching".cyan().bold(),
        path.display(),
        ttl,
        interval
    );

    let mut watcher = FileWatcher::new(path, ttl);
    let mut ticker = tokio::time::interval(interval);
    let mut polls = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        match watcher.poll() {
            Ok(Poll::Fresh(contents)) => {
                println!("{} {}", "[read]  ".green(), first_line(&contents));
            }
            Ok(Poll::Cached(contents)) => {
                println!("{} {}", "[cached]".dimmed(), first_line(&contents));
            }
            Err(e) => {
                let previous = watcher.last_contents().map(first_line).unwrap_or("<none>");
                println!(
                    "{} {}: {} (keeping {})",
                    "[error] ".red(),
                    watcher.path().display(),
                    e,
                    previous
                );
            }
        }

        polls += 1;
        if count.is_some_and(|n| polls >= n) {
            break;
        }
    }

    println!("\n{}", "Stats:".bold());
    println!("{}", serde_json::to_string_pretty(&watcher.stats())?);
    Ok(())
}

fn cmd_bench(count: usize, ttl: Duration) -> Result<()> {
    println!("{} {} accesses (ttl {:?})", "📊 Benchmarking with".cyan().bold(), count, ttl);

    println!("\n{}", "1. Single-threaded cell...".dimmed());
    let mut cell = TtlCell::with_default_ttl(ttl);
    let start = Instant::now();
    let mut sum = 0u64;
    for i in 0..count {
        sum = sum.wrapping_add(*cell.get(|| i as u64));
    }
    let elapsed = start.elapsed();
    report(count, elapsed, cell.stats().hits, cell.stats().misses);
    std::hint::black_box(sum);

    println!("\n{}", "2. Shared cell...".dimmed());
    let cell = SharedTtlCell::with_default_ttl(ttl);
    let start = Instant::now();
    for i in 0..count {
        std::hint::black_box(cell.get(|| i as u64));
    }
    let elapsed = start.elapsed();
    report(count, elapsed, cell.stats().hits, cell.stats().misses);

    Ok(())
}

fn report(count: usize, elapsed: Duration, hits: u64, misses: u64) {
    let rate = count as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("   ✓ {} accesses: {:?}", count, elapsed);
    println!("   ✓ hits {} / misses {}", hits, misses);
    println!("   {} {:.0} accesses/sec", "→".green(), rate);
}

fn first_line(contents: &str) -> &str {
    contents.lines().next().unwrap_or("")
}
