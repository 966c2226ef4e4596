use crate::instance::{Beta, Instance, InstanceError, InstanceId, Node, NodeKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid generator configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Instance(#[from] InstanceError),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rectangular region customers are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            x_min: 0.0,
            x_max: 20.0,
            y_min: 0.0,
            y_max: 20.0,
        }
    }
}

impl Bounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// How customer kinds are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KindMode {
    /// Every customer gets the same kind.
    Fixed { kind: NodeKind },
    /// Kinds drawn per customer with the given relative weights.
    Mixed { truck: f64, drone: f64, paired: f64 },
}

impl Default for KindMode {
    fn default() -> Self {
        KindMode::Fixed {
            kind: NodeKind::DroneOnly,
        }
    }
}

impl KindMode {
    fn draw<R: Rng>(&self, rng: &mut R) -> NodeKind {
        match *self {
            KindMode::Fixed { kind } => kind,
            KindMode::Mixed {
                truck,
                drone,
                paired,
            } => {
                let u = rng.gen::<f64>() * (truck + drone + paired);
                if u < truck {
                    NodeKind::TruckOnly
                } else if u < truck + drone {
                    NodeKind::DroneOnly
                } else {
                    NodeKind::Paired
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub bounds: Bounds,
    /// Depot position.
    pub origin: (f64, f64),
    pub ready_time_min: u32,
    pub ready_time_max: u32,
    pub kind_mode: KindMode,
    pub base_seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            bounds: Bounds::default(),
            origin: (0.0, 0.0),
            ready_time_min: 0,
            ready_time_max: 100,
            kind_mode: KindMode::default(),
            base_seed: 42,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), GenerateError> {
        let b = &self.bounds;
        let finite = [b.x_min, b.x_max, b.y_min, b.y_max, self.origin.0, self.origin.1]
            .iter()
            .all(|v| v.is_finite());
        if !finite || b.x_min > b.x_max || b.y_min > b.y_max {
            return Err(GenerateError::InvalidConfig(format!("bad bounds {:?}", b)));
        }
        if self.ready_time_min > self.ready_time_max {
            return Err(GenerateError::InvalidConfig(format!(
                "ready_time_min {} exceeds ready_time_max {}",
                self.ready_time_min, self.ready_time_max
            )));
        }
        if let KindMode::Mixed {
            truck,
            drone,
            paired,
        } = self.kind_mode
        {
            let weights = [truck, drone, paired];
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                return Err(GenerateError::InvalidConfig(format!(
                    "kind weights must be non-negative with a positive sum, got {:?}",
                    weights
                )));
            }
        }
        Ok(())
    }
}

/// Seed for one instance. Depends only on the base seed and the instance
/// identity, never on what else was generated in the same batch.
pub fn derive_seed(base_seed: u64, customer_count: u32, beta: Beta, instance_number: u32) -> [u8; 32] {
    let key = format!(
        "drone-resupply/{}/{}/{}/{}",
        base_seed,
        customer_count,
        beta.milli(),
        instance_number
    );
    blake3::hash(key.as_bytes()).into()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn draw_coordinate<R: Rng>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    round2(rng.gen_range(lo..=hi)).clamp(lo, hi)
}

/// Generates the instance for `id`.
pub fn generate(id: &InstanceId, config: &GeneratorConfig) -> Result<Instance, GenerateError> {
    config.validate()?;
    let seed = derive_seed(
        config.base_seed,
        id.customer_count,
        id.beta,
        id.instance_number,
    );
    let mut rng = ChaCha8Rng::from_seed(seed);
    let b = &config.bounds;

    let mut nodes = Vec::with_capacity(id.customer_count as usize + 1);
    nodes.push(Node::depot(config.origin.0, config.origin.1));

    let mut next_pair = 1;
    let mut open_pair: Option<usize> = None;
    for node_id in 1..=id.customer_count {
        let x = draw_coordinate(&mut rng, b.x_min, b.x_max);
        let y = draw_coordinate(&mut rng, b.y_min, b.y_max);
        let ready_time = rng.gen_range(config.ready_time_min..=config.ready_time_max);
        let kind = config.kind_mode.draw(&mut rng);

        let mut pair_id = 0;
        if kind == NodeKind::Paired {
            match open_pair.take() {
                Some(partner) => {
                    nodes[partner].pair_id = next_pair;
                    pair_id = next_pair;
                    next_pair += 1;
                }
                None => open_pair = Some(nodes.len()),
            }
        }

        nodes.push(Node {
            id: node_id,
            x,
            y,
            kind,
            ready_time,
            pair_id,
        });
    }

    // A paired draw without a partner degrades to drone-only.
    if let Some(dangling) = open_pair {
        nodes[dangling].kind = NodeKind::DroneOnly;
    }

    Ok(Instance::new(nodes)?)
}

/// Generates and writes one file per identity into `dir`, returning the
/// written paths in input order.
pub fn generate_all<'a, I>(ids: I, dir: &Path, config: &GeneratorConfig) -> Result<Vec<PathBuf>, GenerateError>
where
    I: IntoIterator<Item = &'a InstanceId>,
{
    fs::create_dir_all(dir).map_err(|source| GenerateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for id in ids {
        let instance = generate(id, config)?;
        let path = dir.join(id.file_name());
        instance.write(&path)?;
        debug!(instance = %id, path = %path.display(), "wrote instance");
        written.push(path);
    }
    Ok(written)
}

/// A source line skipped during legacy conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationWarning {
    pub line: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct Conversion {
    pub instance: Instance,
    pub warnings: Vec<GenerationWarning>,
}

/// Converts the legacy `ready_time x y` format (optional `ri` header) into an
/// instance where every customer has `kind` and no pairing.
pub fn convert_legacy(text: &str, kind: NodeKind, origin: (f64, f64)) -> Result<Conversion, GenerateError> {
    if kind == NodeKind::Paired {
        return Err(GenerateError::InvalidConfig(
            "legacy conversion cannot produce paired customers".into(),
        ));
    }

    let mut nodes = vec![Node::depot(origin.0, origin.1)];
    let mut warnings = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || (idx == 0 && line.starts_with("ri")) {
            continue;
        }
        match parse_legacy_line(line) {
            Ok((ready_time, x, y)) => {
                let id = nodes.len() as u32;
                nodes.push(Node {
                    id,
                    x: round2(x),
                    y: round2(y),
                    kind,
                    ready_time,
                    pair_id: 0,
                });
            }
            Err(reason) => {
                warn!(line = idx + 1, content = line, %reason, "skipping malformed legacy line");
                warnings.push(GenerationWarning {
                    line: idx + 1,
                    content: line.to_string(),
                    reason,
                });
            }
        }
    }

    Ok(Conversion {
        instance: Instance::new(nodes)?,
        warnings,
    })
}

fn parse_legacy_line(line: &str) -> Result<(u32, f64, f64), String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!("expected at least 3 fields, found {}", parts.len()));
    }
    let parse = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid number '{}'", s))
    };
    let ready = parse(parts[0])?;
    if ready < 0.0 || ready > u32::MAX as f64 {
        return Err(format!("ready time {} out of range", ready));
    }
    Ok((ready as u32, parse(parts[1])?, parse(parts[2])?))
}

/// Converts `input` and writes the result to `output` (which may be the same
/// file). The output is always fully rewritten.
pub fn convert_file(input: &Path, output: &Path, kind: NodeKind, origin: (f64, f64)) -> Result<Conversion, GenerateError> {
    let text = fs::read_to_string(input).map_err(|source| GenerateError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let conversion = convert_legacy(&text, kind, origin)?;
    conversion.instance.write(output)?;
    Ok(conversion)
}
