use crate::benchmark_utils::{read_batch_results, write_batch_results};
use crate::config::ExperimentPlan;
use crate::dispatch::{Dispatcher, Progress};
use crate::extract::RunResult;
use crate::instance::{list_instance_files, InstanceError, InstanceId};
use crate::report::{compare_batch, compare_rows, Comparison, Summary};
use crate::store::{measurements_from_runs, MergeOutcome, ResultStore, StoreError, UnmatchedPolicy};
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error("batch results file '{path}': {source}")]
    BatchFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct BenchmarkReport {
    pub results: FxHashMap<InstanceId, RunResult>,
    pub merge: MergeOutcome,
    pub comparisons: Vec<Comparison>,
    pub summary: Summary,
}

/// Dispatches every instance of `plan`, persists the batch, merges it into the
/// store and compares it with the baseline.
pub fn run_benchmark<F>(plan: &ExperimentPlan, on_progress: F) -> Result<BenchmarkReport, BenchmarkError>
where
    F: Fn(Progress<'_>) + Sync,
{
    let instances: Vec<(InstanceId, PathBuf)> = plan
        .instance_ids()
        .into_iter()
        .map(|id| {
            let path = plan.instance_path(&id);
            (id, path)
        })
        .collect();
    run_instances(plan, &instances, on_progress)
}

/// Every instance file in the plan's instance directory, whatever the plan's
/// dimensions say.
pub fn discover_instances(plan: &ExperimentPlan) -> Result<Vec<(InstanceId, PathBuf)>, BenchmarkError> {
    let found = list_instance_files(&plan.instance_dir)?;
    info!(dir = %plan.instance_dir.display(), instances = found.len(), "discovered instance files");
    Ok(found)
}

/// Same pipeline as [`run_benchmark`] over an explicit instance list.
pub fn run_instances<F>(
    plan: &ExperimentPlan,
    instances: &[(InstanceId, PathBuf)],
    on_progress: F,
) -> Result<BenchmarkReport, BenchmarkError>
where
    F: Fn(Progress<'_>) + Sync,
{
    let start = Instant::now();
    let results = Dispatcher::from_plan(plan).run_batch_with_progress(instances, on_progress);

    write_batch_results(&results, &plan.batch_results).map_err(|source| BenchmarkError::BatchFile {
        path: plan.batch_results.clone(),
        source,
    })?;
    info!(path = %plan.batch_results.display(), runs = results.len(), "saved batch results");

    let store = ResultStore::new(&plan.store);
    let merge = store.merge_into(&measurements_from_runs(&results, &plan.depot), plan.unmatched_policy)?;

    let comparisons = compare_batch(
        &results,
        &merge.rows,
        &plan.depot,
        plan.tolerance_pct,
        plan.failed_run_policy,
    );
    let summary = Summary::new(&comparisons, plan.pass_threshold, Some(start.elapsed()));
    info!(
        better = summary.better,
        equal = summary.equal,
        worse = summary.worse,
        passed = summary.passed,
        "benchmark finished"
    );

    Ok(BenchmarkReport {
        results,
        merge,
        comparisons,
        summary,
    })
}

/// Merges a saved batch file into a store without re-running anything.
pub fn merge_batch_file(
    batch_path: &Path,
    store_path: &Path,
    depot: &str,
    policy: UnmatchedPolicy,
) -> Result<MergeOutcome, BenchmarkError> {
    let results = read_batch_results(batch_path).map_err(|source| BenchmarkError::BatchFile {
        path: batch_path.to_path_buf(),
        source,
    })?;
    let outcome = ResultStore::new(store_path).merge_into(&measurements_from_runs(&results, depot), policy)?;
    Ok(outcome)
}

/// Classifies every store row that holds both a baseline and a solver value.
pub fn compare_store(
    store_path: &Path,
    tolerance_pct: f64,
    pass_threshold: f64,
) -> Result<(Vec<Comparison>, Summary), BenchmarkError> {
    let table = ResultStore::new(store_path).load()?;
    let comparisons = compare_rows(&table.rows, tolerance_pct);
    let summary = Summary::new(&comparisons, pass_threshold, None);
    Ok((comparisons, summary))
}
