#![cfg(unix)]

use drone_resupply_bench::config::SolverParams;
use drone_resupply_bench::dispatch::Dispatcher;
use drone_resupply_bench::extract::RunStatus;
use drone_resupply_bench::instance::{Beta, InstanceId};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("drb-it-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_solver(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("solver.sh");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_instances(dir: &Path, count: u32) -> Vec<(InstanceId, PathBuf)> {
    (1..=count)
        .map(|k| {
            let id = InstanceId::new(10, Beta::from_milli(500), k);
            let path = dir.join(id.file_name());
            fs::write(&path, "# id X Y type ready_time pair_id\n0 0.00 0.00 D 0 0\n").unwrap();
            (id, path)
        })
        .collect()
}

#[test]
fn thirty_hung_runs_finish_in_waves() {
    let dir = scratch_dir("waves");
    let solver = write_solver(&dir, "echo \"Reading instance: $1\"\nexec sleep 30");
    let instances = write_instances(&dir, 30);
    let timeout = Duration::from_millis(500);

    let completed = AtomicUsize::new(0);
    let start = Instant::now();
    let results = Dispatcher::new(&solver, SolverParams::default(), 10, timeout)
        .run_batch_with_progress(&instances, |_| {
            completed.fetch_add(1, Ordering::Relaxed);
        });
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 30);
    assert_eq!(completed.load(Ordering::Relaxed), 30);
    assert!(results.values().all(|r| r.status == RunStatus::Timeout));
    // Three waves of ten; a serial batch would need 15 s.
    assert!(elapsed >= timeout * 3, "{:?}", elapsed);
    assert!(elapsed < timeout * 12, "{:?}", elapsed);

    let sample = &results[&instances[0].0];
    assert!(sample.raw_output.as_deref().unwrap_or_default().contains("Reading instance:"));
    assert!(sample.wall_time_secs.unwrap() >= 0.5);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failures_stay_with_their_instance() {
    let dir = scratch_dir("isolation");
    let solver = write_solver(
        &dir,
        r#"case "$1" in
  *Num_2.txt) echo "segfault" >&2; exit 139;;
  *Num_4.txt) echo "Cost after Local Search: garbage minutes";;
  *) echo "Cost after Local Search: 100.5 minutes";;
esac"#,
    );
    let instances = write_instances(&dir, 6);
    let results = Dispatcher::new(&solver, SolverParams::default(), 3, Duration::from_secs(10)).run_batch(&instances);

    let status = |k: usize| results[&instances[k - 1].0].status;
    assert_eq!(status(1), RunStatus::Ok);
    assert_eq!(status(2), RunStatus::ProcessError);
    assert_eq!(status(3), RunStatus::Ok);
    assert_eq!(status(4), RunStatus::ParseFailure);
    assert_eq!(status(5), RunStatus::Ok);
    assert_eq!(status(6), RunStatus::Ok);
    assert_eq!(results[&instances[0].0].cmax(), Some(100.5));
    assert_eq!(results[&instances[3].0].cmax(), None);

    fs::remove_dir_all(&dir).unwrap();
}
