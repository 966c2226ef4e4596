use crate::generator::GeneratorConfig;
use crate::instance::{Beta, InstanceId};
use crate::report::FailedRunPolicy;
use crate::store::UnmatchedPolicy;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Longest per-run timeout a plan may ask for: one week.
pub const MAX_TIMEOUT_SECS: f64 = 7.0 * 24.0 * 3600.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read experiment plan '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse experiment plan '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid experiment plan: {0}")]
    Invalid(String),
}

/// Positional solver arguments after the instance path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub population: u32,
    pub generations: u32,
    pub mutation_rate: f64,
    pub variant: u32,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            population: 50,
            generations: 100,
            mutation_rate: 0.1,
            variant: 1,
        }
    }
}

impl SolverParams {
    /// `<population> <generations> <mutation_rate> <variant>`
    pub fn args(&self) -> [String; 4] {
        [
            self.population.to_string(),
            self.generations.to_string(),
            self.mutation_rate.to_string(),
            self.variant.to_string(),
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 || self.generations == 0 {
            return Err(ConfigError::Invalid("population and generations must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::Invalid(format!(
                "mutation_rate must be within [0, 1], got {}",
                self.mutation_rate
            )));
        }
        Ok(())
    }
}

/// One solver invocation of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub instance: InstanceId,
    pub params: SolverParams,
}

/// Experiment plan, read from JSON. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentPlan {
    pub solver: PathBuf,
    pub instance_dir: PathBuf,
    pub customer_counts: Vec<u32>,
    pub betas: Vec<Beta>,
    pub instance_numbers: Vec<u32>,
    /// File-name suffix shared by every instance of the plan, e.g. `pd`.
    pub variant: Option<String>,
    pub solver_params: SolverParams,
    pub concurrency: usize,
    pub timeout_secs: f64,
    pub tolerance_pct: f64,
    /// Minimum share of non-worse classifications for a passing batch.
    pub pass_threshold: f64,
    pub failed_run_policy: FailedRunPolicy,
    pub unmatched_policy: UnmatchedPolicy,
    pub depot: String,
    pub store: PathBuf,
    pub batch_results: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub generator: GeneratorConfig,
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        ExperimentPlan {
            solver: PathBuf::from("./main_ga_tabu"),
            instance_dir: PathBuf::from("instances"),
            customer_counts: vec![10, 15, 20],
            betas: vec![Beta::from_milli(500), Beta::from_milli(1000), Beta::from_milli(1500)],
            instance_numbers: (1..=5).collect(),
            variant: None,
            solver_params: SolverParams::default(),
            concurrency: 10,
            timeout_secs: 120.0,
            tolerance_pct: 0.5,
            pass_threshold: 0.5,
            failed_run_policy: FailedRunPolicy::default(),
            unmatched_policy: UnmatchedPolicy::default(),
            depot: "Center".to_string(),
            store: PathBuf::from("results/results.csv"),
            batch_results: PathBuf::from("results/batch_results.json"),
            log_dir: None,
            generator: GeneratorConfig::default(),
        }
    }
}

fn distinct<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = FxHashSet::default();
    values.iter().all(|v| seen.insert(v))
}

impl ExperimentPlan {
    /// Reads and validates a plan file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let plan: ExperimentPlan = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "timeout_secs must be within (0, {}], got {}",
                MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }
        if self.customer_counts.is_empty() || self.betas.is_empty() || self.instance_numbers.is_empty() {
            return Err(ConfigError::Invalid(
                "customer_counts, betas and instance_numbers must not be empty".into(),
            ));
        }
        if !distinct(&self.customer_counts) || !distinct(&self.betas) || !distinct(&self.instance_numbers) {
            return Err(ConfigError::Invalid("plan dimensions must not repeat values".into()));
        }
        if !self.tolerance_pct.is_finite() || self.tolerance_pct < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance_pct must be finite and non-negative, got {}",
                self.tolerance_pct
            )));
        }
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(ConfigError::Invalid(format!(
                "pass_threshold must be within [0, 1], got {}",
                self.pass_threshold
            )));
        }
        if let FailedRunPolicy::Penalize { diff_pct } = self.failed_run_policy {
            if !diff_pct.is_finite() {
                return Err(ConfigError::Invalid("penalty diff_pct must be finite".into()));
            }
        }
        self.solver_params.validate()?;
        self.generator
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Per-run timeout, clamped to [`MAX_TIMEOUT_SECS`] for unvalidated plans.
    pub fn timeout(&self) -> Duration {
        let max = Duration::from_secs_f64(MAX_TIMEOUT_SECS);
        Duration::try_from_secs_f64(self.timeout_secs)
            .map(|timeout| timeout.min(max))
            .unwrap_or(max)
    }

    /// Cartesian product `customer_counts × betas × instance_numbers`.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let mut ids = Vec::with_capacity(
            self.customer_counts.len() * self.betas.len() * self.instance_numbers.len(),
        );
        for &customers in &self.customer_counts {
            for &beta in &self.betas {
                for &number in &self.instance_numbers {
                    let id = InstanceId::new(customers, beta, number);
                    ids.push(match &self.variant {
                        Some(variant) => id.with_variant(variant.as_str()),
                        None => id,
                    });
                }
            }
        }
        ids
    }

    pub fn configs(&self) -> Vec<ExperimentConfig> {
        self.instance_ids()
            .into_iter()
            .map(|instance| ExperimentConfig {
                instance,
                params: self.solver_params,
            })
            .collect()
    }

    pub fn instance_path(&self, id: &InstanceId) -> PathBuf {
        self.instance_dir.join(id.file_name())
    }
}
