pub mod logs;
pub mod markers;

use crate::instance::InstanceId;
use markers::{Field, Scan};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Outcome class of one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Ok,
    Timeout,
    ProcessError,
    ParseFailure,
}

impl RunStatus {
    pub const ALL: [RunStatus; 4] = [
        RunStatus::Ok,
        RunStatus::Timeout,
        RunStatus::ProcessError,
        RunStatus::ParseFailure,
    ];

    /// Progress symbol printed as each run completes.
    pub fn symbol(self) -> &'static str {
        match self {
            RunStatus::Ok => "✓",
            RunStatus::Timeout => "⏱",
            RunStatus::ProcessError => "✗",
            RunStatus::ParseFailure => "?",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Ok => "OK",
            RunStatus::Timeout => "TIMEOUT",
            RunStatus::ProcessError => "PROCESS_ERROR",
            RunStatus::ParseFailure => "PARSE_FAILURE",
        };
        f.write_str(name)
    }
}

/// A single extracted field. `Absent` and `Malformed` are never collapsed
/// into a default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Reading<T> {
    Found(T),
    Absent,
    Malformed(String),
}

impl<T: Copy> Reading<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Reading::Found(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T> Reading<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Reading::Found(_))
    }
}

impl<T> Default for Reading<T> {
    fn default() -> Self {
        Reading::Absent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Yes,
    No,
    #[default]
    Unknown,
}

impl fmt::Display for Feasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Feasibility::Yes => "YES",
            Feasibility::No => "NO",
            Feasibility::Unknown => "UNKNOWN",
        })
    }
}

/// Which marker supplied the primary cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    AfterLocalSearch,
    FinalBestCost,
    BeforeLocalSearch,
}

/// Structured record of one solver run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub instance: Option<InstanceId>,
    pub status: RunStatus,
    /// Primary C_max: the end-of-run cost, else the GA's final best cost,
    /// else the pre-local-search cost.
    pub cost_after: Reading<f64>,
    pub cost_source: Option<CostSource>,
    /// `Final best cost:` printed when the GA phase completes.
    #[serde(default)]
    pub final_best_cost: Reading<f64>,
    pub cost_before: Reading<f64>,
    pub ga_time: Reading<f64>,
    pub local_search_time: Reading<f64>,
    pub adaptive_initial_cmax: Reading<f64>,
    pub adaptive_final_cmax: Reading<f64>,
    pub resupply_event_count: usize,
    pub feasible: Feasibility,
    pub loaded_nodes: Reading<u32>,
    pub loaded_customers: Reading<u32>,
    pub reported_instance: Option<String>,
    pub wall_time_secs: Option<f64>,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
    /// Kept for diagnosis whenever the status is not `Ok`.
    pub raw_output: Option<String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::ParseFailure
    }
}

impl RunResult {
    /// A run that produced nothing worth extracting.
    pub fn failed(instance: Option<InstanceId>, status: RunStatus, message: impl Into<String>) -> Self {
        RunResult {
            instance,
            status,
            message: Some(message.into()),
            ..RunResult::default()
        }
    }

    pub fn cmax(&self) -> Option<f64> {
        self.cost_after.value()
    }

    /// Solver CPU time: GA plus local-search phase when both are reported,
    /// otherwise the measured wall-clock time of the run.
    pub fn cpu_time(&self) -> Option<f64> {
        match (self.ga_time.value(), self.local_search_time.value()) {
            (Some(ga), Some(ls)) => Some(ga + ls),
            _ => self.wall_time_secs,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

fn parse_fragment<T: FromStr>(fragment: &str) -> Reading<T> {
    // Tolerate sentence punctuation glued to the number.
    let trimmed = fragment.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':'));
    match trimmed.parse::<T>().or_else(|_| fragment.parse::<T>()) {
        Ok(v) => Reading::Found(v),
        Err(_) => Reading::Malformed(fragment.to_string()),
    }
}

fn reading<T: FromStr>(scan: &Scan, field: Field, group: usize) -> Reading<T> {
    match scan.group(field, group) {
        Some(fragment) => parse_fragment(fragment),
        None => Reading::Absent,
    }
}

fn finite(reading: Reading<f64>) -> Reading<f64> {
    match reading {
        Reading::Found(v) if !v.is_finite() => Reading::Malformed(v.to_string()),
        other => other,
    }
}

/// Recovers the instance identity, trying the hint name first, then the path
/// the solver printed, then looser matches on both.
fn recover_identity(hint: &Path, reported: Option<&str>) -> Option<InstanceId> {
    let hint_name = hint.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    InstanceId::from_file_name(hint_name)
        .or_else(|| reported.and_then(InstanceId::from_file_name))
        .or_else(|| InstanceId::search(hint_name))
        .or_else(|| reported.and_then(InstanceId::search))
}

/// Converts raw solver text into a [`RunResult`]. Never panics and never
/// defaults a missing cost to zero.
pub fn extract(raw_text: &str, instance_hint: &Path) -> RunResult {
    let scan = Scan::run(raw_text);

    let cost_before = finite(reading(&scan, Field::CostBefore, 0));
    let after = finite(reading(&scan, Field::CostAfter, 0));
    let final_best_cost = finite(reading(&scan, Field::FinalBestCost, 0));
    let (cost_after, cost_source) = match (&after, &final_best_cost, &cost_before) {
        (Reading::Found(_), _, _) => (after, Some(CostSource::AfterLocalSearch)),
        (_, Reading::Found(v), _) => (Reading::Found(*v), Some(CostSource::FinalBestCost)),
        (_, _, Reading::Found(v)) => (Reading::Found(*v), Some(CostSource::BeforeLocalSearch)),
        _ => (after, None),
    };

    let feasible = match scan.group(Field::Feasible, 0) {
        Some("YES") => Feasibility::Yes,
        Some("NO") => Feasibility::No,
        _ => Feasibility::Unknown,
    };

    let reported_instance = scan.group(Field::ReadingInstance, 0).map(str::to_string);
    let instance = recover_identity(instance_hint, reported_instance.as_deref());

    let status = if cost_source.is_some() {
        RunStatus::Ok
    } else {
        RunStatus::ParseFailure
    };

    RunResult {
        instance,
        status,
        cost_after,
        cost_source,
        cost_before,
        final_best_cost,
        ga_time: finite(reading(&scan, Field::GaTime, 0)),
        local_search_time: finite(reading(&scan, Field::LocalSearchTime, 0)),
        adaptive_initial_cmax: finite(reading(&scan, Field::AdaptiveInitialCmax, 0)),
        adaptive_final_cmax: finite(reading(&scan, Field::AdaptiveFinalCmax, 0)),
        resupply_event_count: scan.count(Field::ResupplyTrip),
        feasible,
        loaded_nodes: reading(&scan, Field::Loaded, 0),
        loaded_customers: reading(&scan, Field::Loaded, 1),
        reported_instance,
        message: (status == RunStatus::ParseFailure)
            .then(|| "no cost marker found in solver output".to_string()),
        raw_output: (status == RunStatus::ParseFailure).then(|| raw_text.to_string()),
        ..RunResult::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Beta;

    const FULL_OUTPUT: &str = "\
Reading instance: Instances 2/U_10_1.0_Num_1.txt
Loaded 11 nodes, 10 customers.
Cost before Local Search: 180.20
[ADAPTIVE LS] Initial C_max: 180.20
[ADAPTIVE LS] Final C_max: 173.45
Cost after Local Search: 173.45 minutes
GA time: 1.25
Local search time: 0.40
   +-- Resupply Trip #1 ----
   +-- Resupply Trip #2 ----
  Feasible: YES
";

    #[test]
    fn end_of_run_marker_is_primary() {
        let r = extract("Cost after Local Search: 173.45 minutes", Path::new("x.txt"));
        assert_eq!(r.status, RunStatus::Ok);
        assert_eq!(r.cost_after, Reading::Found(173.45));
        assert_eq!(r.cost_source, Some(CostSource::AfterLocalSearch));
        assert!(r.raw_output.is_none());
    }

    #[test]
    fn falls_back_to_interim_marker() {
        let r = extract("Cost before Local Search: 201.5\n", Path::new("x.txt"));
        assert_eq!(r.status, RunStatus::Ok);
        assert_eq!(r.cmax(), Some(201.5));
        assert_eq!(r.cost_source, Some(CostSource::BeforeLocalSearch));
    }

    #[test]
    fn final_best_cost_alone_is_enough() {
        let r = extract("Final best cost: 123.45 (penalty: 0.00)\n", Path::new("U_10_0.5_Num_1.log"));
        assert_eq!(r.status, RunStatus::Ok);
        assert_eq!(r.cmax(), Some(123.45));
        assert_eq!(r.cost_source, Some(CostSource::FinalBestCost));
        assert_eq!(r.final_best_cost, Reading::Found(123.45));
        assert_eq!(r.instance, Some(InstanceId::new(10, Beta::from_milli(500), 1)));

        let both = extract("Final best cost: 180.00\nCost after Local Search: 172.00 minutes\n", Path::new("x.txt"));
        assert_eq!(both.cmax(), Some(172.0));
        assert_eq!(both.final_best_cost, Reading::Found(180.0));
    }

    #[test]
    fn missing_markers_are_a_parse_failure_not_zero() {
        let text = "solver crashed politely\nnothing to see";
        let r = extract(text, Path::new("U_10_0.5_Num_1.txt"));
        assert_eq!(r.status, RunStatus::ParseFailure);
        assert_eq!(r.cost_after, Reading::Absent);
        assert_eq!(r.cmax(), None);
        assert_eq!(r.raw_output.as_deref(), Some(text));
        assert_eq!(r.feasible, Feasibility::Unknown);
        assert_eq!(r.resupply_event_count, 0);
    }

    #[test]
    fn malformed_fragment_only_affects_its_field() {
        let text = "Cost after Local Search: 12.5 minutes\nGA time: fast\nLocal search time: 0.3\n";
        let r = extract(text, Path::new("x.txt"));
        assert_eq!(r.status, RunStatus::Ok);
        assert_eq!(r.ga_time, Reading::Malformed("fast".into()));
        assert_eq!(r.local_search_time, Reading::Found(0.3));
        assert_eq!(r.cpu_time(), None);
    }

    #[test]
    fn malformed_primary_falls_back_to_interim() {
        let text = "Cost before Local Search: 99.0\nCost after Local Search: ??? minutes\n";
        let r = extract(text, Path::new("x.txt"));
        assert_eq!(r.cmax(), Some(99.0));
        assert_eq!(r.cost_source, Some(CostSource::BeforeLocalSearch));

        let only_bad = extract("Cost after Local Search: nan minutes", Path::new("x.txt"));
        assert_eq!(only_bad.status, RunStatus::ParseFailure);
        assert!(matches!(only_bad.cost_after, Reading::Malformed(_)));
    }

    #[test]
    fn extracts_every_secondary_metric() {
        let r = extract(FULL_OUTPUT, Path::new("Instances 2/U_10_1.0_Num_1.txt"));
        assert_eq!(r.status, RunStatus::Ok);
        assert_eq!(r.cmax(), Some(173.45));
        assert_eq!(r.cost_before, Reading::Found(180.20));
        assert_eq!(r.adaptive_initial_cmax, Reading::Found(180.20));
        assert_eq!(r.adaptive_final_cmax, Reading::Found(173.45));
        assert_eq!(r.resupply_event_count, 2);
        assert_eq!(r.feasible, Feasibility::Yes);
        assert_eq!(r.loaded_nodes, Reading::Found(11));
        assert_eq!(r.loaded_customers, Reading::Found(10));
        assert!((r.cpu_time().unwrap() - 1.65).abs() < 1e-9);
        assert_eq!(r.instance, Some(InstanceId::new(10, Beta::from_milli(1000), 1)));
    }

    #[test]
    fn feasibility_is_tri_state() {
        let no = extract("Feasible: NO", Path::new("x.txt"));
        assert_eq!(no.feasible, Feasibility::No);
        let odd = extract("Feasible: maybe", Path::new("x.txt"));
        assert_eq!(odd.feasible, Feasibility::Unknown);
    }

    #[test]
    fn identity_comes_from_log_name_or_reported_path() {
        let from_text = extract(FULL_OUTPUT, Path::new("logs/run_17.log"));
        assert_eq!(from_text.instance, Some(InstanceId::new(10, Beta::from_milli(1000), 1)));

        let from_log = extract("Cost after Local Search: 1 minutes", Path::new("logs/U_15_0.5_Num_4_pd.log"));
        assert_eq!(
            from_log.instance,
            Some(InstanceId::new(15, Beta::from_milli(500), 4).with_variant("pd"))
        );

        let derived = extract("", Path::new("big/run2_U_20_1.5_Num_3_pd_s1.log"));
        assert_eq!(derived.instance, Some(InstanceId::new(20, Beta::from_milli(1500), 3)));

        let unknown = extract("", Path::new("logs/run_17.log"));
        assert_eq!(unknown.instance, None);
    }
}
