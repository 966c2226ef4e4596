use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Comment header written as the first line of every instance file.
pub const INSTANCE_HEADER: &str = "# id X Y type ready_time pair_id";

static INSTANCE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^U_(\d+)_(\d+(?:\.\d+)?)_Num_(\d+)(?:_([A-Za-z0-9_]+?))?(?:\.(?:txt|log))?$")
        .expect("instance name pattern is valid")
});

static EMBEDDED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"U_(\d+)_(\d+(?:\.\d+)?)_Num_(\d+)").expect("embedded name pattern is valid")
});

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("I/O error on instance file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("invalid instance: {0}")]
    Invalid(String),
    #[error("invalid beta value '{0}'")]
    InvalidBeta(String),
}

/// Drone range/cost scaling parameter, stored in thousandths so that
/// identities built from it can be hashed and compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Beta(u32);

impl Beta {
    pub const fn from_milli(milli: u32) -> Self {
        Beta(milli)
    }

    pub fn milli(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl TryFrom<f64> for Beta {
    type Error = InstanceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let milli = (value * 1000.0).round();
        if !value.is_finite() || milli < 0.0 || milli > u32::MAX as f64 {
            return Err(InstanceError::InvalidBeta(value.to_string()));
        }
        Ok(Beta(milli as u32))
    }
}

impl From<Beta> for f64 {
    fn from(beta: Beta) -> f64 {
        beta.as_f64()
    }
}

impl FromStr for Beta {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| InstanceError::InvalidBeta(s.to_string()))?;
        Beta::try_from(value)
    }
}

impl fmt::Display for Beta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Always at least one decimal: 1.0, 0.5, 0.25, 0.125
        if self.0 % 100 == 0 {
            write!(f, "{:.1}", self.as_f64())
        } else if self.0 % 10 == 0 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{:.3}", self.as_f64())
        }
    }
}

/// External identity of a benchmark instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId {
    pub customer_count: u32,
    pub beta: Beta,
    pub instance_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl InstanceId {
    pub fn new(customer_count: u32, beta: Beta, instance_number: u32) -> Self {
        InstanceId {
            customer_count,
            beta,
            instance_number,
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        self.variant = if variant.is_empty() { None } else { Some(variant) };
        self
    }

    /// `U_10_0.5_Num_1` or `U_10_0.5_Num_1_pd`.
    pub fn file_stem(&self) -> String {
        let mut stem = format!(
            "U_{}_{}_Num_{}",
            self.customer_count, self.beta, self.instance_number
        );
        if let Some(variant) = &self.variant {
            stem.push('_');
            stem.push_str(variant);
        }
        stem
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.file_stem())
    }

    /// Recovers an identity from an instance or log file name. Any leading
    /// directories are ignored.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = Path::new(name.trim())
            .file_name()
            .and_then(|s| s.to_str())?;
        let caps = INSTANCE_NAME.captures(base)?;
        let customer_count = caps[1].parse().ok()?;
        let beta = caps[2].parse().ok()?;
        let instance_number = caps[3].parse().ok()?;
        let id = InstanceId::new(customer_count, beta, instance_number);
        Some(match caps.get(4) {
            Some(variant) => id.with_variant(variant.as_str()),
            None => id,
        })
    }

    /// Looser variant of [`InstanceId::from_file_name`] for derived names such
    /// as `run3_U_10_0.5_Num_1_pd_seed7.log`. The variant is not recovered.
    pub fn search(text: &str) -> Option<Self> {
        let caps = EMBEDDED_NAME.captures(text)?;
        Some(InstanceId::new(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "T")]
    TruckOnly,
    #[serde(rename = "D")]
    DroneOnly,
    #[serde(rename = "P")]
    Paired,
}

impl NodeKind {
    pub fn symbol(self) -> char {
        match self {
            NodeKind::TruckOnly => 'T',
            NodeKind::DroneOnly => 'D',
            NodeKind::Paired => 'P',
        }
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "T" => Ok(NodeKind::TruckOnly),
            "D" => Ok(NodeKind::DroneOnly),
            "P" => Ok(NodeKind::Paired),
            other => Err(format!("unknown node kind '{}'", other)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub kind: NodeKind,
    pub ready_time: u32,
    pub pair_id: u32,
}

impl Node {
    /// The depot at `(x, y)`; it is always drone-capable and unpaired.
    pub fn depot(x: f64, y: f64) -> Self {
        Node {
            id: 0,
            x,
            y,
            kind: NodeKind::DroneOnly,
            ready_time: 0,
            pair_id: 0,
        }
    }

    fn render(&self) -> String {
        format!(
            "{} {:.2} {:.2} {} {} {}",
            self.id, self.x, self.y, self.kind, self.ready_time, self.pair_id
        )
    }
}

/// An ordered sequence of nodes, depot first.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    nodes: Vec<Node>,
}

impl Instance {
    /// Builds an instance and checks the id and pairing invariants.
    pub fn new(nodes: Vec<Node>) -> Result<Self, InstanceError> {
        let instance = Instance { nodes };
        instance.validate()?;
        Ok(instance)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn depot(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn customers(&self) -> &[Node] {
        &self.nodes[1..]
    }

    pub fn customer_count(&self) -> usize {
        self.nodes.len() - 1
    }

    fn validate(&self) -> Result<(), InstanceError> {
        let depot = self
            .nodes
            .first()
            .ok_or_else(|| InstanceError::Invalid("instance has no depot".into()))?;
        if depot.id != 0 || depot.ready_time != 0 || depot.pair_id != 0 {
            return Err(InstanceError::Invalid(
                "first node must be the depot with id 0, ready_time 0 and pair_id 0".into(),
            ));
        }

        for (expected, node) in self.nodes.iter().enumerate().skip(1) {
            if node.id as usize != expected {
                return Err(InstanceError::Invalid(format!(
                    "customer ids must be contiguous from 1, found {} at position {}",
                    node.id, expected
                )));
            }
            if !node.x.is_finite() || !node.y.is_finite() {
                return Err(InstanceError::Invalid(format!(
                    "node {} has non-finite coordinates",
                    node.id
                )));
            }
        }

        // Every nonzero pair id links exactly two paired customers.
        let mut pair_counts: rustc_hash::FxHashMap<u32, usize> = Default::default();
        for node in self.customers() {
            match (node.kind, node.pair_id) {
                (NodeKind::Paired, 0) => {
                    return Err(InstanceError::Invalid(format!(
                        "paired node {} has pair_id 0",
                        node.id
                    )))
                }
                (NodeKind::Paired, pair) => *pair_counts.entry(pair).or_default() += 1,
                (_, 0) => {}
                (_, pair) => {
                    return Err(InstanceError::Invalid(format!(
                        "unpaired node {} carries pair_id {}",
                        node.id, pair
                    )))
                }
            }
        }
        if let Some((pair, count)) = pair_counts.iter().find(|(_, count)| **count != 2) {
            return Err(InstanceError::Invalid(format!(
                "pair_id {} links {} nodes instead of 2",
                pair, count
            )));
        }
        Ok(())
    }

    /// Renders the instance in the on-disk text format.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(32 * (self.nodes.len() + 1));
        out.push_str(INSTANCE_HEADER);
        out.push('\n');
        for node in &self.nodes {
            out.push_str(&node.render());
            out.push('\n');
        }
        out
    }

    /// Parses the on-disk text format. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, InstanceError> {
        let mut nodes = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            nodes.push(parse_node(line).map_err(|reason| InstanceError::Malformed {
                line: idx + 1,
                reason,
            })?);
        }
        Instance::new(nodes)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Instance::parse(&text)
    }

    /// Writes the instance, replacing any previous content of `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), InstanceError> {
        let path = path.as_ref();
        fs::write(path, self.render()).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_node(line: &str) -> Result<Node, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }
    let number = |i: usize, name: &str| -> Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| format!("invalid {} '{}'", name, fields[i]))
    };
    let integer = |i: usize, name: &str| -> Result<u32, String> {
        fields[i]
            .parse::<u32>()
            .map_err(|_| format!("invalid {} '{}'", name, fields[i]))
    };

    Ok(Node {
        id: integer(0, "id")?,
        x: number(1, "x")?,
        y: number(2, "y")?,
        kind: fields[3].parse()?,
        ready_time: integer(4, "ready_time")?,
        pair_id: integer(5, "pair_id")?,
    })
}

/// Lists every `*.txt` file in `dir` whose name carries an instance identity,
/// sorted by identity.
pub fn list_instance_files<P: AsRef<Path>>(dir: P) -> Result<Vec<(InstanceId, PathBuf)>, InstanceError> {
    let dir = dir.as_ref();
    let io_err = |source| InstanceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() || path.extension().map(|ext| ext != "txt").unwrap_or(true) {
            continue;
        }
        let id = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(InstanceId::from_file_name);
        if let Some(id) = id {
            files.push((id, path));
        }
    }
    files.sort();
    Ok(files)
}
