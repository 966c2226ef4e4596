pub mod pool;
pub mod process;

use crate::config::{ExperimentPlan, SolverParams};
use crate::extract::{extract, RunResult, RunStatus};
use crate::instance::InstanceId;
use pool::{Task, TaskOutcome, WorkerPool};
use process::{Captured, ProcessOutcome};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reported to the progress callback as each run finishes.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub done: usize,
    pub total: usize,
    pub instance: &'a InstanceId,
    pub result: &'a RunResult,
}

/// Runs the external solver over a batch of instance files.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pub solver: PathBuf,
    pub params: SolverParams,
    pub concurrency: usize,
    pub timeout: Duration,
    /// Raw output of every run is written here as `<instance-stem>.log`.
    pub log_dir: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new<P: AsRef<Path>>(solver: P, params: SolverParams, concurrency: usize, timeout: Duration) -> Self {
        Dispatcher {
            solver: solver.as_ref().to_path_buf(),
            params,
            concurrency,
            timeout,
            log_dir: None,
        }
    }

    pub fn from_plan(plan: &ExperimentPlan) -> Self {
        Dispatcher {
            log_dir: plan.log_dir.clone(),
            ..Dispatcher::new(&plan.solver, plan.solver_params, plan.concurrency, plan.timeout())
        }
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn run_batch(&self, instances: &[(InstanceId, PathBuf)]) -> FxHashMap<InstanceId, RunResult> {
        self.run_batch_with_progress(instances, |_| {})
    }

    /// Runs one solver process per instance, at most `concurrency` at a time,
    /// and returns one record per distinct instance. No run can abort the batch.
    pub fn run_batch_with_progress<F>(&self, instances: &[(InstanceId, PathBuf)], on_progress: F) -> FxHashMap<InstanceId, RunResult>
    where
        F: Fn(Progress<'_>) + Sync,
    {
        if let Some(dir) = &self.log_dir {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "cannot create log directory, runs will not be logged");
            }
        }

        let tasks: Vec<SolverRun> = instances
            .iter()
            .map(|(id, path)| SolverRun {
                id: id.clone(),
                instance_path: path.clone(),
                dispatcher: self,
            })
            .collect();
        let total = tasks.len();
        info!(
            runs = total,
            concurrency = self.concurrency,
            timeout_secs = self.timeout.as_secs_f64(),
            solver = %self.solver.display(),
            "dispatching batch"
        );

        let done = AtomicUsize::new(0);
        let pool = WorkerPool::new(self.concurrency, self.timeout);
        let outcomes = pool.run(tasks, |id, outcome| {
            let result = settle(id, outcome);
            let done = done.fetch_add(1, Ordering::Relaxed) + 1;
            on_progress(Progress {
                done,
                total,
                instance: id,
                result: &result,
            });
        });

        if outcomes.len() < total {
            warn!(runs = total, distinct = outcomes.len(), "batch listed some instances more than once");
        }

        outcomes
            .into_iter()
            .map(|(id, outcome)| {
                let result = settle(&id, &outcome).into_owned();
                (id, result)
            })
            .collect()
    }

    fn persist_log(&self, id: &InstanceId, text: &str) {
        if let Some(dir) = &self.log_dir {
            let path = dir.join(format!("{}.log", id.file_stem()));
            if let Err(e) = fs::write(&path, text) {
                warn!(path = %path.display(), error = %e, "cannot write run log");
            }
        }
    }
}

/// The record a pool outcome stands for. `SolverRun` never reports `Failed`
/// itself, so that variant means the run panicked.
fn settle<'a>(id: &InstanceId, outcome: &'a TaskOutcome<RunResult>) -> Cow<'a, RunResult> {
    match outcome {
        TaskOutcome::Completed(r) | TaskOutcome::TimedOut(r) => Cow::Borrowed(r),
        TaskOutcome::Failed(message) => Cow::Owned(RunResult::failed(
            Some(id.clone()),
            RunStatus::ProcessError,
            format!("solver run panicked: {}", message),
        )),
    }
}

/// `run_batch(instances, solver_params, concurrency_limit, timeout)`.
pub fn run_batch(
    instances: &[(InstanceId, PathBuf)],
    solver: &Path,
    params: &SolverParams,
    concurrency_limit: usize,
    timeout: Duration,
) -> FxHashMap<InstanceId, RunResult> {
    Dispatcher::new(solver, *params, concurrency_limit, timeout).run_batch(instances)
}

struct SolverRun<'a> {
    id: InstanceId,
    instance_path: PathBuf,
    dispatcher: &'a Dispatcher,
}

impl SolverRun<'_> {
    fn finish(&self, output: &Captured, status_override: Option<(RunStatus, String)>) -> RunResult {
        let text = output.combined();
        self.dispatcher.persist_log(&self.id, &text);

        let mut result = extract(&text, &self.instance_path);
        result.instance = Some(self.id.clone());
        result.wall_time_secs = Some(output.elapsed.as_secs_f64());
        if let Some((status, message)) = status_override {
            result.status = status;
            result.message = Some(message);
            result.raw_output = Some(text);
        }
        result
    }
}

impl Task for SolverRun<'_> {
    type Key = InstanceId;
    type Output = RunResult;

    fn key(&self) -> InstanceId {
        self.id.clone()
    }

    fn run(self, timeout: Duration) -> TaskOutcome<RunResult> {
        if !self.instance_path.is_file() {
            warn!(instance = %self.id, path = %self.instance_path.display(), "instance file not found");
            return TaskOutcome::Completed(RunResult::failed(
                Some(self.id.clone()),
                RunStatus::ProcessError,
                format!("instance file not found: {}", self.instance_path.display()),
            ));
        }

        let mut args = vec![self.instance_path.to_string_lossy().into_owned()];
        args.extend(self.dispatcher.params.args());
        debug!(instance = %self.id, ?args, "launching solver");

        match process::run_with_timeout(&self.dispatcher.solver, &args, timeout) {
            ProcessOutcome::LaunchFailed(e) => {
                warn!(instance = %self.id, error = %e, "cannot launch solver");
                TaskOutcome::Completed(RunResult::failed(
                    Some(self.id.clone()),
                    RunStatus::ProcessError,
                    format!("cannot launch '{}': {}", self.dispatcher.solver.display(), e),
                ))
            }
            ProcessOutcome::TimedOut { output } => {
                let message = format!("killed after {:.1}s", timeout.as_secs_f64());
                TaskOutcome::TimedOut(self.finish(&output, Some((RunStatus::Timeout, message))))
            }
            ProcessOutcome::Exited { status, output } => {
                let failure = (!status.success()).then(|| {
                    (RunStatus::ProcessError, format!("solver exited with {}", status))
                });
                let mut result = self.finish(&output, failure);
                result.exit_code = status.code();
                TaskOutcome::Completed(result)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::extract::Reading;
    use crate::instance::Beta;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::atomic::AtomicUsize;

    fn scratch_dir() -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "drb-dispatch-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn stub(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("solver.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn instance(dir: &Path, k: u32) -> (InstanceId, PathBuf) {
        let id = InstanceId::new(10, Beta::from_milli(500), k);
        let path = dir.join(id.file_name());
        fs::write(&path, "# id X Y type ready_time pair_id\n0 0.00 0.00 D 0 0\n").unwrap();
        (id, path)
    }

    #[test]
    fn classifies_every_kind_of_run() {
        let dir = scratch_dir();
        // Behaviour is keyed on the instance number in the file name.
        let solver = stub(
            &dir,
            r#"case "$1" in
  *Num_1.txt) echo "Reading instance: $1"; echo "Cost after Local Search: 96.45 minutes"; echo "GA time: 1.0"; echo "Local search time: 0.5";;
  *Num_2.txt) echo "no markers here";;
  *Num_3.txt) echo "Cost after Local Search: 10.0 minutes"; exit 2;;
  *) exec sleep 5;;
esac"#,
        );
        let mut batch: Vec<(InstanceId, PathBuf)> = (1..=4).map(|k| instance(&dir, k)).collect();
        let missing = InstanceId::new(10, Beta::from_milli(500), 5);
        batch.push((missing.clone(), dir.join("absent.txt")));

        let logs = dir.join("logs");
        let dispatcher = Dispatcher::new(&solver, SolverParams::default(), 2, Duration::from_millis(500)).with_log_dir(&logs);
        let progress = AtomicUsize::new(0);
        let results = dispatcher.run_batch_with_progress(&batch, |p| {
            assert_eq!(p.total, 5);
            progress.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(results.len(), 5);
        assert_eq!(progress.load(Ordering::Relaxed), 5);

        let ok = &results[&batch[0].0];
        assert_eq!(ok.status, RunStatus::Ok);
        assert_eq!(ok.cost_after, Reading::Found(96.45));
        assert_eq!(ok.cpu_time(), Some(1.5));
        assert_eq!(ok.exit_code, Some(0));

        let unparsed = &results[&batch[1].0];
        assert_eq!(unparsed.status, RunStatus::ParseFailure);
        assert_eq!(unparsed.raw_output.as_deref(), Some("no markers here\n"));

        let crashed = &results[&batch[2].0];
        assert_eq!(crashed.status, RunStatus::ProcessError);
        assert_eq!(crashed.exit_code, Some(2));

        assert_eq!(results[&batch[3].0].status, RunStatus::Timeout);
        assert_eq!(results[&missing].status, RunStatus::ProcessError);

        let log = fs::read_to_string(logs.join("U_10_0.5_Num_1.log")).unwrap();
        assert!(log.contains("Cost after Local Search: 96.45 minutes"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn panicked_runs_still_report_a_record() {
        let id = InstanceId::new(10, Beta::from_milli(500), 7);
        let failed = TaskOutcome::Failed("index out of bounds".to_string());
        let result = settle(&id, &failed);
        assert_eq!(result.status, RunStatus::ProcessError);
        assert_eq!(result.instance.as_ref(), Some(&id));
        assert_eq!(result.message.as_deref(), Some("solver run panicked: index out of bounds"));

        let line = crate::benchmark_utils::progress_line(&Progress {
            done: 3,
            total: 3,
            instance: &id,
            result: &result,
        });
        assert_eq!(line, "[3/3] U_10_0.5_Num_7 ✗ PROCESS_ERROR (solver run panicked: index out of bounds)");

        let ok = TaskOutcome::Completed(RunResult::failed(Some(id.clone()), RunStatus::Timeout, "x"));
        assert!(matches!(settle(&id, &ok), Cow::Borrowed(_)));
    }

    #[test]
    fn missing_solver_is_a_process_error() {
        let dir = scratch_dir();
        let batch = vec![instance(&dir, 1)];
        let results = run_batch(
            &batch,
            Path::new("/nonexistent/ga_tabu"),
            &SolverParams::default(),
            1,
            Duration::from_secs(1),
        );
        let result = &results[&batch[0].0];
        assert_eq!(result.status, RunStatus::ProcessError);
        assert!(result.message.as_deref().unwrap_or_default().contains("cannot launch"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn passes_positional_parameters() {
        let dir = scratch_dir();
        let solver = stub(&dir, r#"echo "Cost after Local Search: $2.$3 minutes""#);
        let params = SolverParams {
            population: 7,
            generations: 25,
            ..SolverParams::default()
        };
        let batch = vec![instance(&dir, 1)];
        let results = run_batch(&batch, &solver, &params, 1, Duration::from_secs(10));
        assert_eq!(results[&batch[0].0].cmax(), Some(7.25));
        fs::remove_dir_all(&dir).unwrap();
    }
}
