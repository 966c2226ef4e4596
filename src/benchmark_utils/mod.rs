use crate::dispatch::Progress;
use crate::extract::{RunResult, RunStatus};
use crate::instance::InstanceId;
use rustc_hash::FxHashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Filter comes from `RUST_LOG`, default
/// `info`; events go to stderr so stdout carries only progress and tables.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .try_init();
}

/// `[k/n] <instance> <symbol> <value>`
pub fn progress_line(progress: &Progress<'_>) -> String {
    let result = progress.result;
    let detail = match result.status {
        RunStatus::Ok => match result.cmax() {
            Some(cmax) => format!("{:.2}", cmax),
            None => result.status.to_string(),
        },
        status => match &result.message {
            Some(message) => format!("{} ({})", status, message),
            None => status.to_string(),
        },
    };
    format!(
        "[{}/{}] {} {} {}",
        progress.done,
        progress.total,
        progress.instance,
        result.status.symbol(),
        detail
    )
}

/// Persists a batch as pretty JSON, ordered by instance.
pub fn write_batch_results<P: AsRef<Path>>(results: &FxHashMap<InstanceId, RunResult>, path: P) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut entries: Vec<(&InstanceId, &RunResult)> = results.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let records: Vec<RunResult> = entries
        .into_iter()
        .map(|(id, result)| RunResult {
            instance: Some(id.clone()),
            ..result.clone()
        })
        .collect();
    let json = serde_json::to_string_pretty(&records)?;
    fs::write(path, json)
}

/// Reads a file written by [`write_batch_results`]. Records without an
/// instance identity are skipped.
pub fn read_batch_results<P: AsRef<Path>>(path: P) -> io::Result<FxHashMap<InstanceId, RunResult>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let records: Vec<RunResult> = serde_json::from_str(&content)?;

    let mut results = FxHashMap::default();
    for record in records {
        match record.instance.clone() {
            Some(id) => {
                results.insert(id, record);
            }
            None => warn!(path = %path.display(), "batch record without instance identity, skipping"),
        }
    }
    Ok(results)
}
