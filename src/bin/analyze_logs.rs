use anyhow::{Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark_utils::enable_tracing;
use drone_resupply_bench::extract::logs::{analyze_logs, write_summary};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "analyze_logs")]
#[command(about = "Extract metrics from a directory of saved solver logs")]
struct Cli {
    /// Directory of `*.log` files
    dir: PathBuf,

    #[arg(long, default_value = "log_analysis.csv")]
    out: PathBuf,
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let analysis = analyze_logs(&cli.dir).with_context(|| format!("reading {}", cli.dir.display()))?;
    write_summary(&analysis, &cli.out).with_context(|| format!("writing {}", cli.out.display()))?;

    println!(
        "Analysed {} logs, skipped {}; summary in {}",
        analysis.records.len(),
        analysis.skipped.len(),
        cli.out.display()
    );
    for skipped in &analysis.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok(())
}
