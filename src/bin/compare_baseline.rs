use anyhow::{Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark::compare_store;
use drone_resupply_bench::benchmark_utils::enable_tracing;
use drone_resupply_bench::report::{comparison_table, size_table, summary_table};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "compare_baseline")]
#[command(about = "Classify stored GA+Tabu results against the MILP objective")]
struct Cli {
    /// Results store (`;`-separated CSV)
    store: PathBuf,

    /// Differences below this percentage count as equal
    #[arg(long, default_value_t = 0.5)]
    tolerance: f64,

    /// Minimum share of non-worse rows for a pass
    #[arg(long, default_value_t = 0.5)]
    pass_threshold: f64,
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let (comparisons, summary) = compare_store(&cli.store, cli.tolerance, cli.pass_threshold)
        .with_context(|| format!("comparing {}", cli.store.display()))?;

    println!("GA+Tabu vs MILP (tolerance ±{}%)", cli.tolerance);
    comparison_table(&comparisons).printstd();
    summary_table(&summary).printstd();
    println!("Summary by size");
    size_table(&summary).printstd();
    Ok(())
}
