use anyhow::{Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark_utils::enable_tracing;
use drone_resupply_bench::config::ExperimentPlan;
use drone_resupply_bench::generator::{generate_all, KindMode};
use drone_resupply_bench::instance::{Beta, NodeKind};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "generate_instances")]
#[command(about = "Write one instance file per (customers, beta, instance) of a plan")]
struct Cli {
    /// Experiment plan supplying the dimensions and generator settings
    #[arg(long)]
    plan: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    customers: Vec<u32>,

    #[arg(long, value_delimiter = ',')]
    betas: Vec<Beta>,

    #[arg(long, value_delimiter = ',')]
    instances: Vec<u32>,

    /// Output directory (defaults to the plan's instance_dir)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Give every customer this kind: T, D or P
    #[arg(long)]
    kind: Option<NodeKind>,

    /// File-name suffix, e.g. `pd`
    #[arg(long)]
    variant: Option<String>,
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    let mut plan = match &cli.plan {
        Some(path) => ExperimentPlan::load(path)?,
        None => ExperimentPlan::default(),
    };
    if !cli.customers.is_empty() {
        plan.customer_counts = cli.customers;
    }
    if !cli.betas.is_empty() {
        plan.betas = cli.betas;
    }
    if !cli.instances.is_empty() {
        plan.instance_numbers = cli.instances;
    }
    if let Some(seed) = cli.seed {
        plan.generator.base_seed = seed;
    }
    if let Some(kind) = cli.kind {
        plan.generator.kind_mode = KindMode::Fixed { kind };
    }
    if cli.variant.is_some() {
        plan.variant = cli.variant;
    }
    plan.validate()?;

    let dir = cli.out.unwrap_or_else(|| plan.instance_dir.clone());
    let ids = plan.instance_ids();
    let written = generate_all(&ids, &dir, &plan.generator)
        .with_context(|| format!("generating instances into {}", dir.display()))?;

    println!("Wrote {} instances to {}", written.len(), dir.display());
    Ok(())
}
