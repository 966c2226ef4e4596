use anyhow::{Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark::{discover_instances, run_benchmark, run_instances};
use drone_resupply_bench::benchmark_utils::{enable_tracing, progress_line};
use drone_resupply_bench::config::ExperimentPlan;
use drone_resupply_bench::dispatch::Progress;
use drone_resupply_bench::report::{comparison_table, size_table, summary_table};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "run_benchmark")]
#[command(about = "Run the GA+Tabu solver over a plan and compare it with the MILP baseline")]
struct Cli {
    /// Experiment plan (JSON)
    plan: PathBuf,

    /// Override the plan's worker count
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the plan's per-run timeout, in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Run every instance file found in the plan's instance_dir
    #[arg(long)]
    discover: bool,

    /// Exit with status 1 when the batch does not pass
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let mut plan = ExperimentPlan::load(&cli.plan)?;
    if let Some(concurrency) = cli.concurrency {
        plan.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        plan.timeout_secs = timeout;
    }
    plan.validate()?;

    let print = |progress: Progress<'_>| println!("{}", progress_line(&progress));
    let report = if cli.discover {
        let instances = discover_instances(&plan)?;
        run_instances(&plan, &instances, print)
    } else {
        run_benchmark(&plan, print)
    }
    .with_context(|| format!("running plan {}", cli.plan.display()))?;

    println!("\nResults against MILP (tolerance ±{}%)", plan.tolerance_pct);
    comparison_table(&report.comparisons).printstd();
    println!("\nSummary");
    summary_table(&report.summary).printstd();
    println!("\nSummary by size");
    size_table(&report.summary).printstd();

    if cli.strict && !report.summary.passed {
        std::process::exit(1);
    }
    Ok(())
}
