use anyhow::{bail, Context, Result};
use clap::Parser;
use drone_resupply_bench::benchmark_utils::enable_tracing;
use drone_resupply_bench::generator::convert_file;
use drone_resupply_bench::instance::NodeKind;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "convert_instances")]
#[command(about = "Convert legacy `ready_time x y` instance files to the current format")]
struct Cli {
    /// Files or directories of `.txt` files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write converted files here instead of rewriting them in place
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Kind given to every customer: T or D
    #[arg(long, default_value = "D")]
    kind: NodeKind,
}

fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("listing {}", input.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && path.extension().map(|ext| ext == "txt").unwrap_or(false))
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("{} is neither a file nor a directory", input.display());
        }
    }
    Ok(files)
}

fn main() -> Result<()> {
    enable_tracing();
    let cli = Cli::parse();

    if let Some(dir) = &cli.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let files = collect_inputs(&cli.inputs)?;
    let mut warnings = 0;
    for input in &files {
        let output = match (&cli.out_dir, input.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => input.clone(),
        };
        let conversion = convert_file(input, &output, cli.kind, (0.0, 0.0))
            .with_context(|| format!("converting {}", input.display()))?;
        warnings += conversion.warnings.len();
        println!(
            "{} -> {} ({} customers, {} skipped lines)",
            input.display(),
            output.display(),
            conversion.instance.customer_count(),
            conversion.warnings.len()
        );
    }

    println!("Converted {} files, {} lines skipped", files.len(), warnings);
    Ok(())
}
