use crate::extract::{RunResult, RunStatus};
use crate::instance::InstanceId;
use crate::store::{RecordKey, ResultRecord};
use prettytable::{row, Table};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Better,
    Equal,
    Worse,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Better => "BETTER",
            Verdict::Equal => "EQUAL",
            Verdict::Worse => "WORSE",
        })
    }
}

/// `(measured - baseline) / baseline * 100`, or `None` for a zero baseline.
pub fn relative_diff_pct(measured: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 {
        None
    } else {
        Some((measured - baseline) / baseline * 100.0)
    }
}

/// Lower is better. A zero baseline is compared by sign only.
pub fn classify(measured: f64, baseline: f64, tolerance_pct: f64) -> Verdict {
    match relative_diff_pct(measured, baseline) {
        Some(diff) if diff.abs() < tolerance_pct => Verdict::Equal,
        Some(diff) if diff < -tolerance_pct => Verdict::Better,
        Some(_) => Verdict::Worse,
        None if measured < 0.0 => Verdict::Better,
        None if measured == 0.0 => Verdict::Equal,
        None => Verdict::Worse,
    }
}

/// How runs without a usable cost enter the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FailedRunPolicy {
    #[default]
    Exclude,
    /// Counted as WORSE with a fixed difference.
    Penalize { diff_pct: f64 },
}

/// One measured value against its baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub label: String,
    pub customers: u32,
    /// `None` for rows read back from the store.
    pub status: Option<RunStatus>,
    pub measured: Option<f64>,
    pub baseline: Option<f64>,
    pub diff_pct: Option<f64>,
    pub verdict: Option<Verdict>,
}

impl Comparison {
    fn new(
        label: String,
        customers: u32,
        status: Option<RunStatus>,
        measured: Option<f64>,
        baseline: Option<f64>,
        tolerance_pct: f64,
    ) -> Self {
        let (diff_pct, verdict) = match (measured, baseline) {
            (Some(m), Some(b)) => (relative_diff_pct(m, b), Some(classify(m, b, tolerance_pct))),
            _ => (None, None),
        };
        Comparison {
            label,
            customers,
            status,
            measured,
            baseline,
            diff_pct,
            verdict,
        }
    }
}

/// Compares every run of a batch with the baseline objective of its store row.
/// Output is sorted by instance.
pub fn compare_batch(
    results: &FxHashMap<InstanceId, RunResult>,
    rows: &[ResultRecord],
    depot: &str,
    tolerance_pct: f64,
    policy: FailedRunPolicy,
) -> Vec<Comparison> {
    let baselines: FxHashMap<&RecordKey, Option<f64>> = rows
        .iter()
        .map(|row| (&row.key, row.baseline_objective()))
        .collect();

    let mut ids: Vec<&InstanceId> = results.keys().collect();
    ids.sort();

    ids.into_iter()
        .map(|id| {
            let run = &results[id];
            let baseline = baselines
                .get(&RecordKey::for_instance(id, depot))
                .copied()
                .flatten();
            let measured = if run.is_ok() { run.cmax() } else { None };
            let mut comparison = Comparison::new(
                id.to_string(),
                id.customer_count,
                Some(run.status),
                measured,
                baseline,
                tolerance_pct,
            );
            // Without a baseline there is nothing to be worse than.
            if measured.is_none() && baseline.is_some() {
                if let FailedRunPolicy::Penalize { diff_pct } = policy {
                    comparison.diff_pct = Some(diff_pct);
                    comparison.verdict = Some(Verdict::Worse);
                }
            }
            comparison
        })
        .collect()
}

/// Compares store rows that carry both a baseline objective and a solver C_max.
pub fn compare_rows(rows: &[ResultRecord], tolerance_pct: f64) -> Vec<Comparison> {
    rows.iter()
        .filter_map(|row| {
            let measured = row.solver_cmax?;
            let baseline = row.baseline_objective()?;
            let key = &row.key;
            Some(Comparison::new(
                format!("U_{}_{}_Num_{} ({})", key.customers, key.beta, key.instance, key.depot),
                key.customers,
                None,
                Some(measured),
                Some(baseline),
                tolerance_pct,
            ))
        })
        .collect()
}

/// Per customer-count slice of a [`Summary`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SizeSummary {
    pub runs: usize,
    /// Runs that produced a C_max.
    pub solved: usize,
    pub mean_cmax: Option<f64>,
    pub mean_diff_pct: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Aggregate view of a set of comparisons.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub status_counts: BTreeMap<RunStatus, usize>,
    pub better: usize,
    pub equal: usize,
    pub worse: usize,
    pub unclassified: usize,
    pub mean_diff_pct: Option<f64>,
    pub win_rate: Option<f64>,
    pub non_worse_rate: Option<f64>,
    pub pass_threshold: f64,
    pub passed: bool,
    pub elapsed: Option<Duration>,
    pub by_size: BTreeMap<u32, SizeSummary>,
}

impl Summary {
    pub fn new(comparisons: &[Comparison], pass_threshold: f64, elapsed: Option<Duration>) -> Self {
        let mut status_counts = BTreeMap::new();
        let (mut better, mut equal, mut worse) = (0, 0, 0);
        let mut diffs = Vec::new();
        let mut sizes: BTreeMap<u32, (usize, Vec<f64>, Vec<f64>)> = BTreeMap::new();

        for comparison in comparisons {
            if let Some(status) = comparison.status {
                *status_counts.entry(status).or_insert(0) += 1;
            }
            let (runs, cmaxes, size_diffs) = sizes.entry(comparison.customers).or_default();
            *runs += 1;
            if let Some(cmax) = comparison.measured {
                cmaxes.push(cmax);
            }
            if let (Some(_), Some(diff)) = (comparison.verdict, comparison.diff_pct) {
                size_diffs.push(diff);
            }
            match comparison.verdict {
                Some(Verdict::Better) => better += 1,
                Some(Verdict::Equal) => equal += 1,
                Some(Verdict::Worse) => worse += 1,
                None => continue,
            }
            if let Some(diff) = comparison.diff_pct {
                diffs.push(diff);
            }
        }

        let classified = better + equal + worse;
        let rate = |n: usize| (classified > 0).then(|| n as f64 / classified as f64);
        let non_worse_rate = rate(better + equal);
        let by_size = sizes
            .into_iter()
            .map(|(customers, (runs, cmaxes, size_diffs))| {
                let size = SizeSummary {
                    runs,
                    solved: cmaxes.len(),
                    mean_cmax: mean(&cmaxes),
                    mean_diff_pct: mean(&size_diffs),
                };
                (customers, size)
            })
            .collect();

        Summary {
            total: comparisons.len(),
            status_counts,
            better,
            equal,
            worse,
            unclassified: comparisons.len() - classified,
            mean_diff_pct: mean(&diffs),
            win_rate: rate(better),
            non_worse_rate,
            pass_threshold,
            passed: non_worse_rate.map(|r| r >= pass_threshold).unwrap_or(false),
            elapsed,
            by_size,
        }
    }

    pub fn classified(&self) -> usize {
        self.better + self.equal + self.worse
    }
}

fn fmt_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn fmt_rate(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}%", v * 100.0)).unwrap_or_else(|| "-".to_string())
}

pub fn comparison_table(comparisons: &[Comparison]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Instance", "Status", "GA+Tabu", "MILP", "Diff %", "Result"]);
    for c in comparisons {
        table.add_row(row![
            &c.label,
            c.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            fmt_value(c.measured),
            fmt_value(c.baseline),
            c.diff_pct.map(|d| format!("{:+.2}", d)).unwrap_or_else(|| "-".to_string()),
            c.verdict.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

pub fn summary_table(summary: &Summary) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Metric", "Value"]);
    table.add_row(row!["Instances", summary.total]);
    for (status, count) in &summary.status_counts {
        table.add_row(row![format!("{} {}", status.symbol(), status), count]);
    }
    table.add_row(row!["Better than MILP", summary.better]);
    table.add_row(row!["Equal", summary.equal]);
    table.add_row(row!["Worse than MILP", summary.worse]);
    table.add_row(row!["Not classified", summary.unclassified]);
    table.add_row(row![
        "Average difference",
        summary.mean_diff_pct.map(|d| format!("{:+.2}%", d)).unwrap_or_else(|| "-".to_string())
    ]);
    table.add_row(row!["Win rate", fmt_rate(summary.win_rate)]);
    table.add_row(row![
        format!("Not worse (pass >= {:.0}%)", summary.pass_threshold * 100.0),
        format!("{} {}", fmt_rate(summary.non_worse_rate), if summary.passed { "PASS" } else { "FAIL" })
    ]);
    if let Some(elapsed) = summary.elapsed {
        table.add_row(row!["Elapsed", format!("{:.1}s", elapsed.as_secs_f64())]);
    }
    table
}

/// Mean C_max and difference per customer count.
pub fn size_table(summary: &Summary) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Customers", "Runs", "Solved", "Mean C_max", "Mean diff %"]);
    for (customers, size) in &summary.by_size {
        table.add_row(row![
            customers,
            size.runs,
            size.solved,
            fmt_value(size.mean_cmax),
            size.mean_diff_pct.map(|d| format!("{:+.2}", d)).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}
