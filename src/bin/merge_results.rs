use anyhow::{Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark::merge_batch_file;
use drone_resupply_bench::benchmark_utils::enable_tracing;
use drone_resupply_bench::store::UnmatchedPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "merge_results")]
#[command(about = "Merge a saved batch of solver results into the results store")]
struct Cli {
    /// Batch results file written by run_benchmark
    #[arg(long)]
    batch: PathBuf,

    /// Results store (`;`-separated CSV)
    #[arg(long)]
    store: PathBuf,

    #[arg(long, default_value = "Center")]
    depot: String,

    /// Drop results that have no baseline row instead of inserting them
    #[arg(long)]
    discard_unmatched: bool,
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let policy = if cli.discard_unmatched {
        UnmatchedPolicy::Discard
    } else {
        UnmatchedPolicy::Insert
    };
    let outcome = merge_batch_file(&cli.batch, &cli.store, &cli.depot, policy)
        .with_context(|| format!("merging {} into {}", cli.batch.display(), cli.store.display()))?;

    println!(
        "Updated {} rows, inserted {}, discarded {} ({} rows total)",
        outcome.updated,
        outcome.inserted.len(),
        outcome.discarded.len(),
        outcome.rows.len()
    );
    for key in &outcome.discarded {
        println!("  no baseline row for {}", key);
    }
    Ok(())
}
