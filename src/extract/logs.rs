use super::{extract, Reading, RunResult};
use crate::instance::InstanceId;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Token written for values a log did not provide.
const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub path: PathBuf,
    pub instance: InstanceId,
    pub result: RunResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLog {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LogAnalysis {
    pub records: Vec<LogRecord>,
    pub skipped: Vec<SkippedLog>,
}

/// Extracts a record from every `*.log` file in `dir`. Only a failure to list
/// the directory is an error; a bad file is skipped and reported.
pub fn analyze_logs(dir: &Path) -> io::Result<LogAnalysis> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map(|ext| ext == "log").unwrap_or(false))
        .collect();
    paths.sort();

    let mut analysis = LogAnalysis::default();
    for path in paths {
        match analyze_log(&path) {
            Ok(record) => analysis.records.push(record),
            Err(reason) => {
                warn!(path = %path.display(), %reason, "skipping log");
                analysis.skipped.push(SkippedLog { path, reason });
            }
        }
    }

    info!(
        parsed = analysis.records.len(),
        skipped = analysis.skipped.len(),
        "log analysis finished"
    );
    Ok(analysis)
}

fn analyze_log(path: &Path) -> Result<LogRecord, String> {
    let bytes = fs::read(path).map_err(|e| format!("unreadable: {}", e))?;
    let text = String::from_utf8_lossy(&bytes);
    let result = extract(&text, path);
    let instance = result
        .instance
        .clone()
        .ok_or_else(|| "no instance identity in file name or contents".to_string())?;
    Ok(LogRecord {
        path: path.to_path_buf(),
        instance,
        result,
    })
}

#[derive(Serialize)]
struct SummaryRow {
    #[serde(rename = "Instance")]
    instance: String,
    #[serde(rename = "Customers")]
    customers: u32,
    #[serde(rename = "Beta")]
    beta: String,
    #[serde(rename = "Run")]
    run: u32,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Makespan")]
    makespan: String,
    #[serde(rename = "Resupply_Events")]
    resupply_events: usize,
    #[serde(rename = "Feasible")]
    feasible: String,
    #[serde(rename = "C_before_LS")]
    before_ls: String,
    #[serde(rename = "C_after_LS")]
    after_ls: String,
}

fn cell(reading: &Reading<f64>) -> String {
    reading
        .value()
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

impl SummaryRow {
    fn new(record: &LogRecord) -> Self {
        let r = &record.result;
        SummaryRow {
            instance: record.instance.to_string(),
            customers: r.loaded_customers.value().unwrap_or(record.instance.customer_count),
            beta: record.instance.beta.to_string(),
            run: record.instance.instance_number,
            status: r.status.to_string(),
            makespan: cell(if r.final_best_cost.is_found() {
                &r.final_best_cost
            } else {
                &r.cost_after
            }),
            resupply_events: r.resupply_event_count,
            feasible: r.feasible.to_string(),
            before_ls: cell(&r.adaptive_initial_cmax),
            after_ls: cell(&r.adaptive_final_cmax),
        }
    }
}

/// Writes one CSV row per analysed log.
pub fn write_summary(analysis: &LogAnalysis, out: &Path) -> csv::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(out)?;
    for record in &analysis.records {
        writer.serialize(SummaryRow::new(record))?;
    }
    writer.flush()?;
    Ok(())
}
