use crate::extract::RunResult;
use crate::instance::{Beta, InstanceId};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bumped whenever the canonical column set changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Canonical columns, in file order. Anything after them is carried verbatim.
pub const STORE_HEADER: [&str; 9] = [
    "Customers",
    "Depot location",
    "Instance",
    "Beta",
    "MILP CPU time (s)",
    "MILP objective",
    "MILP gap",
    "GA+Tabu C_max",
    "GA+Tabu CPU time (s)",
];

/// Written for a solver value that is not available.
pub const MISSING: &str = "NA";

const DELIMITER: u8 = b';';

fn is_missing(cell: &str) -> bool {
    matches!(cell.trim(), "" | "NA" | "—" | "-")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on results store '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error in results store '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("'{path}' does not start with the results header (found '{found}')")]
    Header { path: PathBuf, found: String },
    #[error("line {line}, column '{column}': cannot read '{value}'")]
    BadCell {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error("line {line}: key {key} appears more than once")]
    DuplicateKey { line: u64, key: RecordKey },
}

/// Composite key of a canonical row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub customers: u32,
    pub depot: String,
    pub instance: u32,
    pub beta: Beta,
}

impl RecordKey {
    pub fn new(customers: u32, depot: impl Into<String>, instance: u32, beta: Beta) -> Self {
        RecordKey {
            customers,
            depot: depot.into(),
            instance,
            beta,
        }
    }

    /// Key under which a run of `id` is stored. The instance variant is not
    /// part of the key.
    pub fn for_instance(id: &InstanceId, depot: &str) -> Self {
        RecordKey::new(id.customer_count, depot, id.instance_number, id.beta)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.customers, self.depot, self.instance, self.beta
        )
    }
}

/// One canonical row. Baseline cells keep their original text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub key: RecordKey,
    pub milp_cpu_time: String,
    pub milp_objective: String,
    pub milp_gap: String,
    pub solver_cmax: Option<f64>,
    pub solver_cpu_time: Option<f64>,
    /// Values of the table's extra columns, in column order.
    pub extra: Vec<String>,
}

impl ResultRecord {
    /// A row that exists only because a solver result had nowhere to go.
    fn inserted(key: RecordKey, measurement: &SolverMeasurement) -> Self {
        ResultRecord {
            key,
            milp_cpu_time: MISSING.to_string(),
            milp_objective: MISSING.to_string(),
            milp_gap: MISSING.to_string(),
            solver_cmax: measurement.cmax,
            solver_cpu_time: measurement.cpu_time,
            extra: Vec::new(),
        }
    }

    pub fn baseline_objective(&self) -> Option<f64> {
        parse_baseline(&self.milp_objective)
    }

    pub fn baseline_cpu_time(&self) -> Option<f64> {
        parse_baseline(&self.milp_cpu_time)
    }

    fn apply(&mut self, measurement: &SolverMeasurement) {
        self.solver_cmax = measurement.cmax;
        self.solver_cpu_time = measurement.cpu_time;
    }
}

fn parse_baseline(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse().ok().filter(|v: &f64| v.is_finite())
}

/// Solver-side values of one run, the only cells a merge may write.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SolverMeasurement {
    pub cmax: Option<f64>,
    pub cpu_time: Option<f64>,
}

impl SolverMeasurement {
    /// Values of a run with status `OK`. Any other run has nothing to store.
    pub fn from_run(result: &RunResult) -> Option<Self> {
        result.is_ok().then(|| SolverMeasurement {
            cmax: result.cmax(),
            cpu_time: result.cpu_time(),
        })
    }
}

/// Keys a batch of runs for merging. Failed runs are left out, so a failed
/// rerun never overwrites values already in the store.
pub fn measurements_from_runs(
    results: &FxHashMap<InstanceId, RunResult>,
    depot: &str,
) -> FxHashMap<RecordKey, SolverMeasurement> {
    let mut ids: Vec<&InstanceId> = results.keys().collect();
    ids.sort();
    let mut measurements = FxHashMap::default();
    for id in ids {
        let result = &results[id];
        let Some(measurement) = SolverMeasurement::from_run(result) else {
            debug!(instance = %id, status = %result.status, "run did not succeed, not merging");
            continue;
        };
        let key = RecordKey::for_instance(id, depot);
        if measurements.insert(key.clone(), measurement).is_some() {
            warn!(%key, instance = %id, "two runs map to the same store key, keeping the later one");
        }
    }
    measurements
}

/// What to do with results whose key has no row yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    #[default]
    Insert,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub rows: Vec<ResultRecord>,
    pub updated: usize,
    pub inserted: Vec<RecordKey>,
    pub discarded: Vec<RecordKey>,
}

/// Upserts solver values into `existing`. Baseline and extra cells are never
/// touched, and rows without a new result keep their solver values.
pub fn merge(
    existing: Vec<ResultRecord>,
    new_results: &FxHashMap<RecordKey, SolverMeasurement>,
    policy: UnmatchedPolicy,
) -> MergeOutcome {
    let mut rows = existing;
    let mut updated = 0;
    let mut seen: FxHashSet<RecordKey> = FxHashSet::default();

    for row in rows.iter_mut() {
        if let Some(measurement) = new_results.get(&row.key) {
            row.apply(measurement);
            updated += 1;
        }
        seen.insert(row.key.clone());
    }

    let mut unmatched: Vec<&RecordKey> = new_results.keys().filter(|k| !seen.contains(*k)).collect();
    unmatched.sort();

    let mut inserted = Vec::new();
    let mut discarded = Vec::new();
    for key in unmatched {
        match policy {
            UnmatchedPolicy::Insert => {
                info!(%key, "no baseline row for result, inserting");
                rows.push(ResultRecord::inserted(key.clone(), &new_results[key]));
                inserted.push(key.clone());
            }
            UnmatchedPolicy::Discard => {
                warn!(%key, "no baseline row for result, discarding");
                discarded.push(key.clone());
            }
        }
    }

    MergeOutcome {
        rows,
        updated,
        inserted,
        discarded,
    }
}

/// In-memory contents of a store file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreTable {
    pub extra_columns: Vec<String>,
    pub rows: Vec<ResultRecord>,
}

/// File-backed results store. Single writer only.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ResultStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole store. A missing file is an empty store.
    pub fn load(&self) -> Result<StoreTable, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "results store does not exist yet, starting empty");
            return Ok(StoreTable::default());
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| self.csv_error(source))?;

        let headers = reader.headers().map_err(|source| self.csv_error(source))?.clone();
        let canonical = headers.len() >= STORE_HEADER.len()
            && headers.iter().zip(STORE_HEADER.iter()).all(|(found, want)| found.trim() == *want);
        if !canonical {
            return Err(StoreError::Header {
                path: self.path.clone(),
                found: headers.iter().collect::<Vec<_>>().join(";"),
            });
        }
        let extra_columns: Vec<String> = headers.iter().skip(STORE_HEADER.len()).map(str::to_string).collect();

        let mut rows = Vec::new();
        let mut keys: FxHashSet<RecordKey> = FxHashSet::default();
        for record in reader.records() {
            let record = record.map_err(|source| self.csv_error(source))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row = parse_row(&record, line)?;
            if !keys.insert(row.key.clone()) {
                return Err(StoreError::DuplicateKey { line, key: row.key });
            }
            rows.push(row);
        }

        debug!(path = %self.path.display(), rows = rows.len(), extra = extra_columns.len(), "loaded results store");
        Ok(StoreTable { extra_columns, rows })
    }

    /// Rewrites the whole store through a sibling temporary file.
    pub fn save(&self, table: &StoreTable) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let tmp = self.temp_path();
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(DELIMITER)
                .from_path(&tmp)
                .map_err(|source| self.csv_error(source))?;

            let mut header: Vec<&str> = STORE_HEADER.to_vec();
            header.extend(table.extra_columns.iter().map(String::as_str));
            writer.write_record(&header).map_err(|source| self.csv_error(source))?;

            for row in &table.rows {
                writer
                    .write_record(render_row(row, table.extra_columns.len()))
                    .map_err(|source| self.csv_error(source))?;
            }
            writer.flush().map_err(|source| self.io_error(source))?;
        }
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), rows = table.rows.len(), "saved results store");
        Ok(())
    }

    /// Full read, in-memory merge, full rewrite.
    pub fn merge_into(
        &self,
        new_results: &FxHashMap<RecordKey, SolverMeasurement>,
        policy: UnmatchedPolicy,
    ) -> Result<MergeOutcome, StoreError> {
        let table = self.load()?;
        let outcome = merge(table.rows, new_results, policy);
        self.save(&StoreTable {
            extra_columns: table.extra_columns,
            rows: outcome.rows.clone(),
        })?;
        info!(
            path = %self.path.display(),
            updated = outcome.updated,
            inserted = outcome.inserted.len(),
            discarded = outcome.discarded.len(),
            "merged results into store"
        );
        Ok(outcome)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "results".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Cells past the end of a short row read as empty.
fn cell<'a>(record: &'a csv::StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("")
}

fn parse_key_cell<T: std::str::FromStr>(record: &csv::StringRecord, index: usize, line: u64) -> Result<T, StoreError> {
    let value = cell(record, index);
    value.trim().parse().map_err(|_| StoreError::BadCell {
        line,
        column: STORE_HEADER[index],
        value: value.to_string(),
    })
}

fn parse_solver_cell(record: &csv::StringRecord, index: usize, line: u64) -> Result<Option<f64>, StoreError> {
    let value = cell(record, index);
    if is_missing(value) {
        return Ok(None);
    }
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(StoreError::BadCell {
            line,
            column: STORE_HEADER[index],
            value: value.to_string(),
        }),
    }
}

fn parse_row(record: &csv::StringRecord, line: u64) -> Result<ResultRecord, StoreError> {
    let key = RecordKey {
        customers: parse_key_cell(record, 0, line)?,
        depot: cell(record, 1).trim().to_string(),
        instance: parse_key_cell(record, 2, line)?,
        beta: parse_key_cell(record, 3, line)?,
    };
    Ok(ResultRecord {
        key,
        milp_cpu_time: cell(record, 4).to_string(),
        milp_objective: cell(record, 5).to_string(),
        milp_gap: cell(record, 6).to_string(),
        solver_cmax: parse_solver_cell(record, 7, line)?,
        solver_cpu_time: parse_solver_cell(record, 8, line)?,
        extra: record.iter().skip(STORE_HEADER.len()).map(str::to_string).collect(),
    })
}

fn render_value(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| MISSING.to_string())
}

fn render_row(row: &ResultRecord, extra_columns: usize) -> Vec<String> {
    let mut cells = vec![
        row.key.customers.to_string(),
        row.key.depot.clone(),
        row.key.instance.to_string(),
        row.key.beta.to_string(),
        row.milp_cpu_time.clone(),
        row.milp_objective.clone(),
        row.milp_gap.clone(),
        render_value(row.solver_cmax),
        render_value(row.solver_cpu_time),
    ];
    cells.extend(row.extra.iter().cloned());
    cells.resize(STORE_HEADER.len() + extra_columns, String::new());
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract, RunStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SAMPLE: &str = "\
Customers;Depot location;Instance;Beta;MILP CPU time (s);MILP objective;MILP gap;GA+Tabu C_max;GA+Tabu CPU time (s);Notes
10;Center;1;0.5;12.30;173.00;0.00%;NA;NA;first
10;Center;2;0.5;45.1;181.5;1.2%;—;;
15;Border;1;1.0;3600;—;12%;200.10;9.50;timeout in MILP
";

    fn scratch_store(contents: Option<&str>) -> ResultStore {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "drb-store-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("results.csv");
        if let Some(text) = contents {
            fs::write(&path, text).unwrap();
        }
        ResultStore::new(path)
    }

    fn key(customers: u32, depot: &str, instance: u32, beta_milli: u32) -> RecordKey {
        RecordKey::new(customers, depot, instance, Beta::from_milli(beta_milli))
    }

    fn measured(cmax: f64, cpu: f64) -> SolverMeasurement {
        SolverMeasurement {
            cmax: Some(cmax),
            cpu_time: Some(cpu),
        }
    }

    fn sample_rows() -> Vec<ResultRecord> {
        vec![
            ResultRecord {
                key: key(10, "Center", 1, 500),
                milp_cpu_time: "12.30".into(),
                milp_objective: "173.00".into(),
                milp_gap: "0.00%".into(),
                solver_cmax: None,
                solver_cpu_time: None,
                extra: vec![],
            },
            ResultRecord {
                key: key(15, "Border", 1, 1000),
                milp_cpu_time: "3600".into(),
                milp_objective: "—".into(),
                milp_gap: "12%".into(),
                solver_cmax: Some(190.0),
                solver_cpu_time: Some(4.0),
                extra: vec![],
            },
        ]
    }

    #[test]
    fn empty_merge_is_a_no_op() {
        let rows = sample_rows();
        let outcome = merge(rows.clone(), &FxHashMap::default(), UnmatchedPolicy::Insert);
        assert_eq!(outcome.rows, rows);
        assert_eq!(outcome.updated, 0);
        assert!(outcome.inserted.is_empty());
    }

    #[test]
    fn merge_touches_only_solver_columns() {
        let mut results = FxHashMap::default();
        results.insert(key(10, "Center", 1, 500), measured(172.4, 1.5));
        let outcome = merge(sample_rows(), &results, UnmatchedPolicy::Insert);

        assert_eq!(outcome.updated, 1);
        let row = &outcome.rows[0];
        assert_eq!(row.solver_cmax, Some(172.4));
        assert_eq!(row.milp_objective, "173.00");
        assert_eq!(row.milp_gap, "0.00%");
        // Untouched row keeps its earlier solver values.
        assert_eq!(outcome.rows[1].solver_cmax, Some(190.0));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut results = FxHashMap::default();
        results.insert(key(10, "Center", 1, 500), measured(172.4, 1.5));
        results.insert(key(20, "Center", 3, 1500), measured(250.0, 7.0));
        results.insert(key(20, "Center", 1, 1500), measured(240.0, 6.0));

        let once = merge(sample_rows(), &results, UnmatchedPolicy::Insert);
        let twice = merge(once.rows.clone(), &results, UnmatchedPolicy::Insert);
        assert_eq!(once.rows, twice.rows);
        assert!(twice.inserted.is_empty());

        let keys: Vec<&RecordKey> = once.rows.iter().map(|r| &r.key).collect();
        assert_eq!(keys.len(), 4);
        // Inserted rows come after existing ones, in key order.
        assert_eq!(keys[2], &key(20, "Center", 1, 1500));
        assert_eq!(keys[3], &key(20, "Center", 3, 1500));
        assert_eq!(once.rows[2].milp_objective, MISSING);
    }

    #[test]
    fn discard_policy_reports_unmatched_keys() {
        let mut results = FxHashMap::default();
        results.insert(key(99, "Center", 1, 500), measured(1.0, 1.0));
        let outcome = merge(sample_rows(), &results, UnmatchedPolicy::Discard);
        assert_eq!(outcome.rows, sample_rows());
        assert_eq!(outcome.discarded, vec![key(99, "Center", 1, 500)]);
    }

    #[test]
    fn load_reads_sentinels_and_extra_columns() {
        let store = scratch_store(Some(SAMPLE));
        let table = store.load().unwrap();
        assert_eq!(table.extra_columns, vec!["Notes".to_string()]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].solver_cmax, None);
        assert_eq!(table.rows[1].solver_cmax, None);
        assert_eq!(table.rows[1].solver_cpu_time, None);
        assert_eq!(table.rows[2].solver_cmax, Some(200.10));
        assert_eq!(table.rows[2].baseline_objective(), None);
        assert_eq!(table.rows[0].baseline_objective(), Some(173.0));
        assert_eq!(table.rows[2].extra, vec!["timeout in MILP".to_string()]);
    }

    #[test]
    fn merge_into_preserves_unknown_cells_on_disk() {
        let store = scratch_store(Some(SAMPLE));
        let mut results = FxHashMap::default();
        results.insert(key(10, "Center", 2, 500), measured(180.0, 2.25));
        store.merge_into(&results, UnmatchedPolicy::Insert).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SAMPLE.lines().next().unwrap());
        assert_eq!(lines[1], "10;Center;1;0.5;12.30;173.00;0.00%;NA;NA;first");
        assert_eq!(lines[2], "10;Center;2;0.5;45.1;181.5;1.2%;180.00;2.25;");
        assert_eq!(lines[3], "15;Border;1;1.0;3600;—;12%;200.10;9.50;timeout in MILP");

        // A second identical merge leaves the file unchanged.
        store.merge_into(&results, UnmatchedPolicy::Insert).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), text);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let text = format!("{}10;Center;1;0.50;1;1;0%;NA;NA;again\n", SAMPLE);
        let err = scratch_store(Some(&text)).load().unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { line: 5, .. }), "{err}");
    }

    #[test]
    fn garbage_solver_cell_names_its_column() {
        let text = SAMPLE.replace("200.10", "fast");
        match scratch_store(Some(&text)).load().unwrap_err() {
            StoreError::BadCell { line, column, value } => {
                assert_eq!(line, 4);
                assert_eq!(column, "GA+Tabu C_max");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_rows_read_as_missing_cells() {
        let text = format!("{}20;Center;4;1.5;61.0;300\n", SAMPLE);
        let store = scratch_store(Some(&text));
        let table = store.load().unwrap();
        let short = &table.rows[3];
        assert_eq!(short.key, key(20, "Center", 4, 1500));
        assert_eq!(short.baseline_objective(), Some(300.0));
        assert_eq!(short.milp_gap, "");
        assert_eq!(short.solver_cmax, None);
        assert!(short.extra.is_empty());

        let mut results = FxHashMap::default();
        results.insert(key(20, "Center", 4, 1500), measured(290.0, 3.0));
        store.merge_into(&results, UnmatchedPolicy::Insert).unwrap();
        let saved = fs::read_to_string(store.path()).unwrap();
        assert_eq!(saved.lines().nth(4), Some("20;Center;4;1.5;61.0;300;;290.00;3.00;"));

        let truncated = scratch_store(Some(&format!("{}20;Center\n", SAMPLE)));
        assert!(matches!(truncated.load(), Err(StoreError::BadCell { column: "Instance", .. })));
    }

    #[test]
    fn foreign_header_is_rejected() {
        let store = scratch_store(Some("a;b;c\n1;2;3\n"));
        assert!(matches!(store.load(), Err(StoreError::Header { .. })));
    }

    #[test]
    fn missing_store_starts_empty_and_is_created() {
        let store = scratch_store(None);
        let mut results = FxHashMap::default();
        results.insert(key(10, "Center", 1, 500), SolverMeasurement::default());
        let outcome = store.merge_into(&results, UnmatchedPolicy::Insert).unwrap();
        assert_eq!(outcome.inserted.len(), 1);
        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text.lines().nth(1), Some("10;Center;1;0.5;NA;NA;NA;NA;NA"));
    }

    #[test]
    fn failed_rerun_keeps_stored_values() {
        let store = scratch_store(Some(
            "Customers;Depot location;Instance;Beta;MILP CPU time (s);MILP objective;MILP gap;GA+Tabu C_max;GA+Tabu CPU time (s)\n\
             10;Center;1;0.5;1;173;0%;170.00;1.50\n",
        ));
        let before = fs::read_to_string(store.path()).unwrap();

        let hint = std::path::Path::new("U_10_0.5_Num_1.txt");
        let id = InstanceId::new(10, Beta::from_milli(500), 1);
        let orphan = InstanceId::new(20, Beta::from_milli(500), 4);
        let mut runs = FxHashMap::default();
        runs.insert(id.clone(), RunResult::failed(Some(id), RunStatus::Timeout, "killed after 1.0s"));
        runs.insert(orphan.clone(), RunResult::failed(Some(orphan), RunStatus::ProcessError, "exit 1"));
        assert!(SolverMeasurement::from_run(&extract("no markers", hint)).is_none());

        let measurements = measurements_from_runs(&runs, "Center");
        assert!(measurements.is_empty());
        let outcome = store.merge_into(&measurements, UnmatchedPolicy::Insert).unwrap();
        assert_eq!(outcome.updated, 0);
        assert!(outcome.inserted.is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(outcome.rows[0].solver_cmax, Some(170.0));
    }
}
