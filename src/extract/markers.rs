use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

/// Output fields the solver reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CostBefore,
    CostAfter,
    FinalBestCost,
    GaTime,
    LocalSearchTime,
    AdaptiveInitialCmax,
    AdaptiveFinalCmax,
    ResupplyTrip,
    Feasible,
    Loaded,
    ReadingInstance,
}

/// What a marker contributes when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Capture groups of the last match.
    Last,
    /// Number of matches.
    Count,
}

#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub field: Field,
    pub pattern: &'static str,
    pub capture: Capture,
}

/// Every marker the extractor understands. Markers are case-sensitive.
pub const MARKERS: &[Marker] = &[
    Marker {
        field: Field::CostBefore,
        pattern: r"Cost before Local Search:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::CostAfter,
        pattern: r"Cost after Local Search:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::FinalBestCost,
        pattern: r"Final best cost:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::GaTime,
        pattern: r"GA time:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::LocalSearchTime,
        pattern: r"Local search time:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::AdaptiveInitialCmax,
        pattern: r"\[ADAPTIVE LS\] Initial C_max:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::AdaptiveFinalCmax,
        pattern: r"\[ADAPTIVE LS\] Final C_max:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::ResupplyTrip,
        pattern: r"Resupply Trip",
        capture: Capture::Count,
    },
    Marker {
        field: Field::Feasible,
        pattern: r"Feasible:[ \t]*(\S+)",
        capture: Capture::Last,
    },
    Marker {
        field: Field::Loaded,
        pattern: r"Loaded[ \t]+(\S+)[ \t]+nodes,[ \t]*(\S+)[ \t]+customers",
        capture: Capture::Last,
    },
    Marker {
        field: Field::ReadingInstance,
        pattern: r"Reading instance:[ \t]*([^\r\n]+)",
        capture: Capture::Last,
    },
];

static COMPILED: Lazy<Vec<(Marker, Regex)>> = Lazy::new(|| {
    MARKERS
        .iter()
        .map(|m| (*m, Regex::new(m.pattern).expect("marker patterns are valid")))
        .collect()
});

#[derive(Debug, Clone, PartialEq)]
enum Hit {
    Groups(Vec<String>),
    Count(usize),
}

/// Result of running the whole marker table over one text once.
#[derive(Debug, Default)]
pub struct Scan {
    hits: FxHashMap<Field, Hit>,
}

impl Scan {
    pub fn run(text: &str) -> Self {
        let mut hits = FxHashMap::default();
        for (marker, regex) in COMPILED.iter() {
            match marker.capture {
                Capture::Count => {
                    hits.insert(marker.field, Hit::Count(regex.find_iter(text).count()));
                }
                Capture::Last => {
                    // The final summary is printed last, so the last match wins.
                    if let Some(caps) = regex.captures_iter(text).last() {
                        let groups = caps
                            .iter()
                            .skip(1)
                            .map(|g| g.map(|m| m.as_str().trim().to_string()).unwrap_or_default())
                            .collect();
                        hits.insert(marker.field, Hit::Groups(groups));
                    }
                }
            }
        }
        Scan { hits }
    }

    /// Capture group `index` (0-based, excluding the whole match) of `field`.
    pub fn group(&self, field: Field, index: usize) -> Option<&str> {
        match self.hits.get(&field) {
            Some(Hit::Groups(groups)) => groups.get(index).map(String::as_str),
            _ => None,
        }
    }

    pub fn count(&self, field: Field) -> usize {
        match self.hits.get(&field) {
            Some(Hit::Count(n)) => *n,
            Some(Hit::Groups(_)) => 1,
            None => 0,
        }
    }
}
